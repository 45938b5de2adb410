use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::format::PcmFormat;
use super::mock::MockDevice;
use crate::error::{RecorderError, SourceError};

/// Outcome of a single read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRead {
    /// `n` bytes were written to the front of the buffer
    Data(usize),
    /// Nothing this cycle (transient invalid operation); not end-of-stream
    NoData,
}

/// An open input stream producing raw PCM blocks
///
/// Owned by the capture thread for the whole session. Implementations need
/// not be `Send`: they are created on the thread that reads them.
pub trait SampleSource {
    /// Size of the buffer `read_block` expects, in bytes
    fn block_size(&self) -> usize;

    /// Block until a full block is available or the device fails
    fn read_block(&mut self, buf: &mut [u8]) -> Result<BlockRead, SourceError>;

    /// Stop and release the device
    fn close(&mut self) -> Result<(), SourceError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// An input device that can be opened at a given format
///
/// Platform implementations:
/// - Microphone: cpal default input device (`microphone` feature)
/// - Mock: scripted blocks for tests and dry runs
pub trait SampleDevice: Send + Sync {
    /// Open the device for capture
    ///
    /// The block size is the platform minimum buffer for `format` scaled by
    /// `buffer_multiplier`. Fails with `DeviceUnavailable` if the device did
    /// not initialize or could not be started.
    fn open(
        &self,
        format: PcmFormat,
        buffer_multiplier: usize,
    ) -> Result<Box<dyn SampleSource>, RecorderError>;

    /// Whether an input device is present and usable
    fn is_available(&self) -> bool;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Input device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Default system microphone
    #[default]
    Microphone,
    /// Silent scripted device
    Mock,
}

/// Sample device factory
pub struct DeviceFactory;

impl DeviceFactory {
    /// Create a sample device for the requested kind
    pub fn create(kind: DeviceKind) -> anyhow::Result<Arc<dyn SampleDevice>> {
        match kind {
            DeviceKind::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    use super::microphone::MicrophoneDevice;
                    Ok(Arc::new(MicrophoneDevice::new()))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    anyhow::bail!(
                        "Microphone capture requires building with the `microphone` feature"
                    )
                }
            }

            DeviceKind::Mock => Ok(Arc::new(MockDevice::silence(4096))),
        }
    }
}
