/// Errors surfaced by the recorder to its caller
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("A recording is already in progress")]
    AlreadyRecording,
    #[error("No recording in progress")]
    NotRecording,
    #[error("Unsupported output format '{0}': no platform encoder configured")]
    UnsupportedFormat(String),
    #[error("Capture failed: {0}")]
    CaptureFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unrecoverable failure while reading from a sample source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Device read failed: {0}")]
    Read(String),
    #[error("Device disconnected: {0}")]
    Disconnected(String),
}
