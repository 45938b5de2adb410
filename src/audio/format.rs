use serde::{Deserialize, Serialize};

/// PCM layout of captured audio (16-bit little-endian, interleaved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

/// The only format the WAV path records in: 44.1kHz mono 16-bit
pub const RECORDING_FORMAT: PcmFormat = PcmFormat {
    sample_rate: 44_100,
    channels: 1,
    bits_per_sample: 16,
};

impl PcmFormat {
    /// Bytes per second of audio
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    /// Bytes per sample frame (all channels)
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Number of bytes holding `millis` of audio, rounded down to whole frames
    pub fn bytes_for_millis(&self, millis: u64) -> usize {
        let frames = self.sample_rate as u64 * millis / 1000;
        frames as usize * self.block_align() as usize
    }

    /// Playback duration of `bytes` of PCM in this format
    pub fn duration_millis(&self, bytes: u64) -> u64 {
        let rate = self.byte_rate() as u64;
        if rate == 0 {
            return 0;
        }
        bytes * 1000 / rate
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        RECORDING_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_format_derived_fields() {
        assert_eq!(RECORDING_FORMAT.byte_rate(), 88_200);
        assert_eq!(RECORDING_FORMAT.block_align(), 2);
    }

    #[test]
    fn stereo_derived_fields() {
        let stereo = PcmFormat {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 16,
        };
        assert_eq!(stereo.byte_rate(), 192_000);
        assert_eq!(stereo.block_align(), 4);
    }

    #[test]
    fn bytes_for_millis_rounds_to_frames() {
        // 20ms at 44.1kHz = 882 frames = 1764 bytes
        assert_eq!(RECORDING_FORMAT.bytes_for_millis(20), 1764);
        assert_eq!(RECORDING_FORMAT.duration_millis(88_200), 1000);
    }
}
