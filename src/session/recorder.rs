use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::config::RecorderConfig;
use super::encoder::PlatformEncoder;
use super::session::{
    generated_output_path, is_wav_extension, normalize_extension, scratch_path, RecordingSession,
    SessionState,
};
use super::stats::{RecorderStatus, RecordingResult};
use crate::audio::scratch::remove_scratch;
use crate::audio::{finalize, CaptureHandle, SampleDevice, RECORDING_FORMAT};
use crate::error::RecorderError;

/// What is producing audio for the active session
enum Backend {
    /// Built-in capture into a scratch file, finalized to WAV on stop
    Wav {
        capture: CaptureHandle,
        scratch_path: PathBuf,
    },
    /// Injected platform encoder writing the output directly
    Encoder(Arc<dyn PlatformEncoder>),
}

struct ActiveSession {
    session: RecordingSession,
    backend: Backend,
}

/// Recording controller: owns the single session and its state machine
///
/// `start` and `stop` are serialized through an async mutex; `is_recording`
/// reads an atomic and never waits on either.
pub struct Recorder {
    config: RecorderConfig,
    device: Arc<dyn SampleDevice>,
    encoder: Option<Arc<dyn PlatformEncoder>>,
    state: AtomicU8,
    active: Mutex<Option<ActiveSession>>,
}

impl Recorder {
    /// Create a recorder capturing WAV audio from `device`
    pub fn new(config: RecorderConfig, device: Arc<dyn SampleDevice>) -> Self {
        info!(
            "Recorder initialized: device '{}', output dir {:?}, scratch dir {:?}",
            device.name(),
            config.output_dir,
            config.scratch_dir
        );

        Self {
            config,
            device,
            encoder: None,
            state: AtomicU8::new(SessionState::Idle as u8),
            active: Mutex::new(None),
        }
    }

    /// Delegate non-WAV extensions to `encoder`
    pub fn with_encoder(mut self, encoder: Arc<dyn PlatformEncoder>) -> Self {
        info!("Platform encoder registered: {}", encoder.name());
        self.encoder = Some(encoder);
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn SampleDevice> {
        &self.device
    }

    /// Current state of the controller
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether a session is capturing; no side effects
    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Capturing
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Start recording
    ///
    /// `path` defaults to `<output_dir>/<start millis><extension>`. `.wav`
    /// captures through the built-in pipeline; other extensions go to the
    /// platform encoder. Returns once the device is recording.
    pub async fn start(
        &self,
        path: Option<PathBuf>,
        extension: &str,
    ) -> Result<(), RecorderError> {
        let mut active = self.active.lock().await;

        if active.is_some() || self.state() != SessionState::Idle {
            warn!("Start requested while a recording is in progress");
            return Err(RecorderError::AlreadyRecording);
        }

        let extension = normalize_extension(extension);
        let started_at = Utc::now();
        let output_path = path.unwrap_or_else(|| {
            generated_output_path(&self.config.output_dir, started_at, &extension)
        });

        info!("Starting recording: {}", output_path.display());

        let (backend, scratch) = if is_wav_extension(&extension) {
            let scratch = scratch_path(&self.config.scratch_dir);
            let capture = CaptureHandle::launch(
                Arc::clone(&self.device),
                RECORDING_FORMAT,
                self.config.buffer_multiplier,
                scratch.clone(),
            )
            .await
            .map_err(|e| {
                error!("Failed to start capture: {}", e);
                e
            })?;

            (
                Backend::Wav {
                    capture,
                    scratch_path: scratch.clone(),
                },
                Some(scratch),
            )
        } else {
            let encoder = self
                .encoder
                .as_ref()
                .filter(|encoder| encoder.supports(&extension))
                .ok_or_else(|| RecorderError::UnsupportedFormat(extension.clone()))?;

            encoder.start(&output_path, &extension).await?;
            (Backend::Encoder(Arc::clone(encoder)), None)
        };

        *active = Some(ActiveSession {
            session: RecordingSession {
                output_path,
                scratch_path: scratch,
                format: RECORDING_FORMAT,
                extension,
                started_at,
                state: SessionState::Capturing,
            },
            backend,
        });
        self.set_state(SessionState::Capturing);

        info!("Recording started");

        Ok(())
    }

    /// Stop recording and materialize the output file
    ///
    /// Waits for the capture thread to exit before finalizing. The scratch
    /// file is removed whether or not finalization succeeds, and the
    /// recorder is back to Idle on every path.
    pub async fn stop(&self) -> Result<RecordingResult, RecorderError> {
        let mut active = self.active.lock().await;

        if self.state() != SessionState::Capturing {
            warn!("Stop requested with no recording in progress");
            return Err(RecorderError::NotRecording);
        }

        let Some(ActiveSession {
            mut session,
            backend,
        }) = active.take()
        else {
            self.set_state(SessionState::Idle);
            return Err(RecorderError::NotRecording);
        };

        info!("Stopping recording: {}", session.output_path.display());

        let outcome = match backend {
            Backend::Wav {
                capture,
                scratch_path,
            } => self.finish_wav(&mut session, capture, scratch_path).await,
            Backend::Encoder(encoder) => encoder.stop().await,
        };

        let duration = session.elapsed_ms();
        session.state = SessionState::Closed;
        self.set_state(SessionState::Idle);

        if let Err(e) = outcome {
            error!("Recording failed: {}", e);
            return Err(e);
        }

        info!(
            "Recording stopped: {} ({} ms)",
            session.output_path.display(),
            duration
        );

        Ok(RecordingResult {
            duration,
            path: session.output_path.display().to_string(),
            audio_output_format: session.extension,
        })
    }

    async fn finish_wav(
        &self,
        session: &mut RecordingSession,
        capture: CaptureHandle,
        scratch_path: PathBuf,
    ) -> Result<(), RecorderError> {
        let block_size = capture.block_size();

        // Join before touching the scratch file: it must be closed for writing
        let report = capture.stop().await;

        session.state = SessionState::Finalizing;
        self.set_state(SessionState::Finalizing);

        let format = session.format;
        let output_path = session.output_path.clone();
        let scratch = scratch_path.clone();
        let finalized =
            tokio::task::spawn_blocking(move || finalize(&scratch, &output_path, format, block_size))
                .await
                .map_err(|e| RecorderError::CaptureFailed(format!("finalize task panicked: {}", e)))
                .and_then(|result| result.map_err(RecorderError::from));

        if let Err(e) = remove_scratch(&scratch_path) {
            warn!("{:#}", e);
        }

        let report = report?;
        finalized?;

        if report.release_failed {
            warn!("Audio device reported an error on release; captured audio was kept");
        }

        match report.fatal {
            Some(reason) => Err(RecorderError::CaptureFailed(reason)),
            None => Ok(()),
        }
    }

    /// Snapshot of the recorder state and active session
    pub async fn status(&self) -> RecorderStatus {
        let active = self.active.lock().await;
        let session = active.as_ref().map(|a| &a.session);

        RecorderStatus {
            state: self.state(),
            path: session.map(|s| s.output_path.display().to_string()),
            started_at: session.map(|s| s.started_at),
            elapsed_ms: session.map(|s| s.elapsed_ms()),
        }
    }
}
