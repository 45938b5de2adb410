//! Method-call surface
//!
//! Decodes named method calls (as sent over a Flutter method channel or the
//! local HTTP API) into recorder operations:
//! - `start {path?, extension?}` -> null
//! - `stop` -> {duration, path, audioOutputFormat}
//! - `isRecording` -> bool
//! - `hasPermissions` -> bool
//!
//! Failures come back as `ChannelError { code, message }`; unknown methods
//! as `notImplemented`.

mod permissions;

pub use permissions::{HostPermissions, PermissionProbe};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::RecorderError;
use crate::session::Recorder;

/// A named call with JSON arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Structured failure returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ChannelError {
    pub code: String,
    pub message: String,
}

impl ChannelError {
    pub const NOT_IMPLEMENTED: &'static str = "NOT_IMPLEMENTED";
    pub const INVALID_ARGUMENTS: &'static str = "INVALID_ARGUMENTS";

    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_implemented(method: &str) -> Self {
        Self::new(Self::NOT_IMPLEMENTED, format!("Method '{}' is not implemented", method))
    }

    pub fn is_not_implemented(&self) -> bool {
        self.code == Self::NOT_IMPLEMENTED
    }
}

impl From<RecorderError> for ChannelError {
    fn from(err: RecorderError) -> Self {
        let code = match &err {
            RecorderError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            RecorderError::AlreadyRecording => "ALREADY_RECORDING",
            RecorderError::NotRecording => "NOT_RECORDING",
            RecorderError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            RecorderError::CaptureFailed(_) => "CAPTURE_FAILED",
            RecorderError::Io(_) => "IO_ERROR",
        };
        Self::new(code, err.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct StartArguments {
    path: Option<String>,
    #[serde(default)]
    extension: String,
}

/// Dispatches method calls to a `Recorder`
#[derive(Clone)]
pub struct MethodChannel {
    recorder: Arc<Recorder>,
    permissions: Arc<dyn PermissionProbe>,
}

impl MethodChannel {
    pub fn new(recorder: Arc<Recorder>, permissions: Arc<dyn PermissionProbe>) -> Self {
        Self {
            recorder,
            permissions,
        }
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Handle one call
    pub async fn handle(&self, call: MethodCall) -> Result<Value, ChannelError> {
        debug!("Method call: {}", call.method);

        match call.method.as_str() {
            "start" => {
                let args: StartArguments = if call.arguments.is_null() {
                    StartArguments::default()
                } else {
                    serde_json::from_value(call.arguments).map_err(|e| {
                        ChannelError::new(
                            ChannelError::INVALID_ARGUMENTS,
                            format!("Invalid start arguments: {}", e),
                        )
                    })?
                };

                self.recorder
                    .start(args.path.map(PathBuf::from), &args.extension)
                    .await?;
                Ok(Value::Null)
            }
            "stop" => {
                let result = self.recorder.stop().await?;
                info!("Duration: {} ms", result.duration);
                serde_json::to_value(result).map_err(|e| {
                    ChannelError::new("INTERNAL", format!("Failed to encode result: {}", e))
                })
            }
            "isRecording" => Ok(Value::Bool(self.recorder.is_recording())),
            "hasPermissions" => Ok(Value::Bool(self.permissions.has_permissions())),
            other => Err(ChannelError::not_implemented(other)),
        }
    }
}
