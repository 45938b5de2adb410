pub mod backend;
pub mod capture;
pub mod file;
pub mod format;
pub mod mock;
pub mod scratch;
pub mod wav;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{BlockRead, DeviceFactory, DeviceKind, SampleDevice, SampleSource};
pub use capture::{CaptureHandle, CaptureReport, PcmBlock};
pub use file::RecordedFile;
pub use format::{PcmFormat, RECORDING_FORMAT};
pub use mock::{MockDevice, MockRead};
pub use scratch::ScratchWriter;
pub use wav::{finalize, FinalizeReport, WaveHeader, HEADER_LEN};
