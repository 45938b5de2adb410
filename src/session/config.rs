use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Directory for generated output paths when the caller gives none
    pub output_dir: PathBuf,

    /// Directory holding raw PCM scratch files while capturing
    pub scratch_dir: PathBuf,

    /// Capture block size as a multiple of the device's minimum buffer
    /// Default: 3 (absorbs scheduling jitter without dropping samples)
    pub buffer_multiplier: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            scratch_dir: std::env::temp_dir().join("wav-recorder"),
            buffer_multiplier: 3,
        }
    }
}
