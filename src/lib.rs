pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use audio::{
    BlockRead, CaptureHandle, CaptureReport, DeviceFactory, DeviceKind, MockDevice, PcmFormat,
    RecordedFile, SampleDevice, SampleSource, RECORDING_FORMAT,
};
pub use channel::{ChannelError, HostPermissions, MethodCall, MethodChannel, PermissionProbe};
pub use config::Config;
pub use error::{RecorderError, SourceError};
pub use http::{create_router, AppState};
pub use session::{PlatformEncoder, Recorder, RecorderConfig, RecorderStatus, RecordingResult};
