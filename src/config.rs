use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::DeviceKind;
use crate::session::RecorderConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub recorder: RecorderSection,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecorderSection {
    pub output_dir: String,
    pub scratch_dir: Option<String>,
    pub buffer_multiplier: usize,
    pub device: DeviceKind,
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            output_dir: "recordings".to_string(),
            scratch_dir: None,
            buffer_multiplier: 3,
            device: DeviceKind::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3300,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("WAV_RECORDER").separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    /// Recorder settings with `~` expanded
    pub fn recorder_config(&self) -> RecorderConfig {
        let defaults = RecorderConfig::default();

        RecorderConfig {
            output_dir: expand(&self.recorder.output_dir),
            scratch_dir: self
                .recorder
                .scratch_dir
                .as_deref()
                .map(expand)
                .unwrap_or(defaults.scratch_dir),
            buffer_multiplier: self.recorder.buffer_multiplier.max(1),
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
