use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::audio::PcmFormat;

/// Extension that selects the built-in WAV capture path
pub const WAV_EXTENSION: &str = ".wav";

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Capturing = 1,
    Finalizing = 2,
    Closed = 3,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Capturing,
            2 => SessionState::Finalizing,
            3 => SessionState::Closed,
            _ => SessionState::Idle,
        }
    }
}

/// The in-flight recording, owned by the `Recorder`
#[derive(Debug, Clone)]
pub struct RecordingSession {
    /// Final destination
    pub output_path: PathBuf,
    /// Raw PCM scratch file (WAV sessions only)
    pub scratch_path: Option<PathBuf>,
    pub format: PcmFormat,
    /// Requested extension, normalized to start with a dot
    pub extension: String,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
}

impl RecordingSession {
    pub fn is_wav(&self) -> bool {
        is_wav_extension(&self.extension)
    }

    /// Milliseconds since the session started
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0)
    }
}

/// Ensure a non-empty extension starts with a dot (`wav` -> `.wav`)
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{}", trimmed)
    }
}

pub fn is_wav_extension(extension: &str) -> bool {
    extension.eq_ignore_ascii_case(WAV_EXTENSION)
}

/// Output path for callers that give none: `<dir>/<start millis><extension>`
pub fn generated_output_path(dir: &Path, started_at: DateTime<Utc>, extension: &str) -> PathBuf {
    dir.join(format!("{}{}", started_at.timestamp_millis(), extension))
}

/// Fresh scratch file path inside `dir`
pub fn scratch_path(dir: &Path) -> PathBuf {
    dir.join(format!("record-{}.raw", Uuid::new_v4()))
}
