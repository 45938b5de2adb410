//! Recording session management
//!
//! This module provides the `Recorder` controller that manages:
//! - The single active `RecordingSession` and its state machine
//! - Launching and joining the capture thread for WAV output
//! - Finalizing the scratch PCM into a WAV file and cleaning up
//! - Delegating other formats to an injected platform encoder

mod config;
mod encoder;
mod recorder;
mod session;
mod stats;

pub use config::RecorderConfig;
pub use encoder::PlatformEncoder;
pub use recorder::Recorder;
pub use session::{
    generated_output_path, is_wav_extension, normalize_extension, RecordingSession, SessionState,
    WAV_EXTENSION,
};
pub use stats::{RecorderStatus, RecordingResult};
