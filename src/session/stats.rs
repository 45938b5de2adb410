use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Result of a completed `stop`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingResult {
    /// Elapsed wall-clock time between start and stop, in milliseconds
    pub duration: i64,

    /// Path of the finished recording
    pub path: String,

    /// Extension the recording was started with
    #[serde(rename = "audioOutputFormat")]
    pub audio_output_format: String,
}

/// Snapshot of the recorder for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub state: SessionState,

    /// Output path of the active session, if any
    pub path: Option<String>,

    /// When the active session started
    pub started_at: Option<DateTime<Utc>>,

    /// Milliseconds since the active session started
    pub elapsed_ms: Option<i64>,
}
