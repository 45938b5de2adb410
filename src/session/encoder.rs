use std::path::Path;

use crate::error::RecorderError;

/// Platform encoder used for non-WAV outputs (AAC/MPEG-4 and similar)
///
/// The crate ships no implementation: hosts that can encode inject one into
/// the `Recorder`. Without one, non-WAV starts fail with `UnsupportedFormat`.
#[async_trait::async_trait]
pub trait PlatformEncoder: Send + Sync {
    /// Whether this encoder can produce files with `extension`
    fn supports(&self, extension: &str) -> bool;

    /// Begin recording to `output_path`
    async fn start(&self, output_path: &Path, extension: &str) -> Result<(), RecorderError>;

    /// Stop recording and release the encoder
    async fn stop(&self) -> Result<(), RecorderError>;

    /// Encoder name for logging
    fn name(&self) -> &str;
}
