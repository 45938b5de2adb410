// RIFF/WAVE container
//
// The scratch file holds headerless PCM. Finalization prepends the canonical
// 44-byte header (RIFF / fmt / data, little-endian, PCM format code 1, no
// extension bytes) and streams the payload behind it in capture-sized blocks.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::format::PcmFormat;

/// Size of the canonical header
pub const HEADER_LEN: usize = 44;

/// Size of the `fmt ` chunk body for plain PCM
const FMT_CHUNK_SIZE: u32 = 16;

/// WAVE format code for uncompressed PCM
const FORMAT_PCM: u16 = 1;

/// Header bytes between the RIFF size field and the end of the header
const RIFF_OVERHEAD: u32 = 36;

/// Header for a PCM payload of known length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    /// Payload size in bytes (`data` chunk size)
    pub total_audio_len: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WaveHeader {
    /// Header for `total_audio_len` bytes of `format` audio
    ///
    /// Fails with `InvalidData` when the payload does not fit the 32-bit
    /// RIFF size fields.
    pub fn new(total_audio_len: u64, format: PcmFormat) -> io::Result<Self> {
        let max = (u32::MAX - RIFF_OVERHEAD) as u64;
        if total_audio_len > max {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "PCM payload of {} bytes exceeds the RIFF limit of {} bytes",
                    total_audio_len, max
                ),
            ));
        }

        Ok(Self {
            total_audio_len: total_audio_len as u32,
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
        })
    }

    /// RIFF chunk size: everything after the first 8 bytes
    pub fn total_data_len(&self) -> u32 {
        self.total_audio_len + RIFF_OVERHEAD
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Serialize to the 44-byte on-disk layout
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];

        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.total_data_len().to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
        header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());

        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.total_audio_len.to_le_bytes());

        header
    }

    /// Write the header to `out`
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_bytes())
    }
}

/// Result of a successful finalization
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub output_path: PathBuf,
    /// PCM payload size (the `data` chunk size)
    pub total_audio_len: u64,
    /// Output file size, header included
    pub file_len: u64,
}

/// Wrap the raw PCM in `scratch_path` into a WAV file at `output_path`
///
/// The payload is copied in `block_size` chunks, including a final short
/// chunk, so memory use is bounded regardless of recording length.
pub fn finalize(
    scratch_path: &Path,
    output_path: &Path,
    format: PcmFormat,
    block_size: usize,
) -> io::Result<FinalizeReport> {
    let mut input = File::open(scratch_path)?;
    let total_audio_len = input.metadata()?.len();

    let header = WaveHeader::new(total_audio_len, format)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let output = File::create(output_path)?;
    let copied = match write_payload(output, &header, &mut input, block_size, total_audio_len) {
        Ok(copied) => copied,
        Err(e) => {
            // A truncated container is worse than none
            if let Err(remove_err) = fs::remove_file(output_path) {
                warn!(
                    "Failed to remove partial output {}: {}",
                    output_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }
    };

    let file_len = HEADER_LEN as u64 + copied;

    info!(
        "WAV finalized: {} ({} bytes PCM, {:.1}s)",
        output_path.display(),
        total_audio_len,
        format.duration_millis(total_audio_len) as f64 / 1000.0
    );

    Ok(FinalizeReport {
        output_path: output_path.to_path_buf(),
        total_audio_len,
        file_len,
    })
}

fn write_payload(
    mut output: File,
    header: &WaveHeader,
    input: &mut File,
    block_size: usize,
    total_audio_len: u64,
) -> io::Result<u64> {
    header.write_to(&mut output)?;

    let mut block = vec![0u8; block_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = match input.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        output.write_all(&block[..n])?;
        copied += n as u64;
    }

    output.flush()?;
    output.sync_all()?;

    if copied != total_audio_len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "scratch file changed during finalization: expected {} bytes, copied {}",
                total_audio_len, copied
            ),
        ));
    }

    Ok(copied)
}
