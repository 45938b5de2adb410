use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::audio::SampleDevice;

/// Answers the `hasPermissions` query
pub trait PermissionProbe: Send + Sync {
    /// Whether output storage is writable
    fn storage_granted(&self) -> bool;

    /// Whether the microphone can be used
    fn microphone_granted(&self) -> bool;

    /// Both grants present
    fn has_permissions(&self) -> bool {
        self.storage_granted() && self.microphone_granted()
    }
}

/// Probes the host: the output directory must be creatable and writable and
/// the input device must be available
pub struct HostPermissions {
    output_dir: PathBuf,
    device: Arc<dyn SampleDevice>,
}

impl HostPermissions {
    pub fn new(output_dir: impl Into<PathBuf>, device: Arc<dyn SampleDevice>) -> Self {
        Self {
            output_dir: output_dir.into(),
            device,
        }
    }
}

impl PermissionProbe for HostPermissions {
    fn storage_granted(&self) -> bool {
        match probe_writable(&self.output_dir) {
            Ok(()) => true,
            Err(e) => {
                debug!("Output directory {:?} not writable: {}", self.output_dir, e);
                false
            }
        }
    }

    fn microphone_granted(&self) -> bool {
        self.device.is_available()
    }
}

/// Create and remove a probe file in `dir`
fn probe_writable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(format!(".probe-{}", Uuid::new_v4()));
    OpenOptions::new().write(true).create_new(true).open(&probe)?;
    fs::remove_file(&probe)
}
