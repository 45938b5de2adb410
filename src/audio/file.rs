use anyhow::{Context, Result};
use hound::WavReader;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use super::format::PcmFormat;

/// Summary of a finished WAV recording, read back from disk
#[derive(Debug, Clone, Serialize)]
pub struct RecordedFile {
    pub path: String,
    pub format: PcmFormat,
    pub duration_seconds: f64,
    /// Samples per channel
    pub frames: u32,
    pub file_size_bytes: u64,
    /// Peak absolute sample value (0..=32768 for 16-bit)
    pub peak: u32,
}

impl RecordedFile {
    /// Open and scan a WAV file without keeping the samples in memory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Inspecting recording: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let frames = reader.duration();
        let mut peak = 0u32;
        for sample in reader.into_samples::<i16>() {
            let sample = sample.context("Failed to read audio samples")?;
            peak = peak.max((sample as i32).unsigned_abs());
        }

        let file_size_bytes = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        let duration_seconds = frames as f64 / spec.sample_rate as f64;

        info!(
            "Recording: {:.2}s, {}Hz, {} channel(s), {} bytes",
            duration_seconds, spec.sample_rate, spec.channels, file_size_bytes
        );

        Ok(Self {
            path: path.display().to_string(),
            format: PcmFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                bits_per_sample: spec.bits_per_sample,
            },
            duration_seconds,
            frames,
            file_size_bytes,
            peak,
        })
    }

    /// Whether every sample in the file is zero
    pub fn is_silent(&self) -> bool {
        self.peak == 0
    }
}
