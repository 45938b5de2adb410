// Integration tests for finalized WAV output
//
// Finished recordings are read back with hound to confirm the container is
// valid for ordinary WAV readers, not just byte-for-byte what we wrote.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wav_recorder::audio::{finalize, ScratchWriter, HEADER_LEN};
use wav_recorder::{MockDevice, RecordedFile, Recorder, RecorderConfig, RECORDING_FORMAT};

fn tone_block(samples: usize, amplitude: i16) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| {
            let value = if i % 2 == 0 { amplitude } else { -amplitude };
            value.to_le_bytes()
        })
        .collect()
}

#[test]
fn test_finalized_scratch_reads_back_with_hound() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let scratch = temp_dir.path().join("take.raw");
    let output = temp_dir.path().join("take.wav");

    let mut writer = ScratchWriter::create(&scratch)?;
    for _ in 0..5 {
        writer.append(&tone_block(441, 1000))?;
    }
    writer.close()?;

    let report = finalize(&scratch, &output, RECORDING_FORMAT, 512)?;
    assert_eq!(report.total_audio_len, 5 * 882);
    assert_eq!(report.file_len, (HEADER_LEN + 5 * 882) as u64);

    let reader = hound::WavReader::open(&output)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration(), 5 * 441);

    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples[0], 1000);
    assert_eq!(samples[1], -1000);

    Ok(())
}

#[test]
fn test_recorded_file_summary() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let scratch = temp_dir.path().join("tone.raw");
    let output = temp_dir.path().join("tone.wav");

    let mut writer = ScratchWriter::create(&scratch)?;
    writer.append(&tone_block(44100, 1200))?;
    writer.close()?;
    finalize(&scratch, &output, RECORDING_FORMAT, 4096)?;

    let recording = RecordedFile::open(&output)?;

    assert_eq!(recording.format, RECORDING_FORMAT);
    assert_eq!(recording.frames, 44100);
    assert!((recording.duration_seconds - 1.0).abs() < 1e-9);
    assert_eq!(recording.peak, 1200);
    assert!(!recording.is_silent());
    assert!(recording.path.contains("tone.wav"));

    Ok(())
}

#[test]
fn test_empty_recording_is_valid_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let scratch = temp_dir.path().join("empty.raw");
    let output = temp_dir.path().join("empty.wav");

    ScratchWriter::create(&scratch)?.close()?;
    finalize(&scratch, &output, RECORDING_FORMAT, 4096)?;

    let recording = RecordedFile::open(&output)?;
    assert_eq!(recording.file_size_bytes, HEADER_LEN as u64);
    assert_eq!(recording.frames, 0);
    assert!(recording.is_silent());

    Ok(())
}

#[tokio::test]
async fn test_recorded_silence_is_silent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let device = MockDevice::new(2048).with_zero_blocks(6);
    let recorder = Recorder::new(
        RecorderConfig {
            output_dir: temp_dir.path().to_path_buf(),
            scratch_dir: temp_dir.path().join("scratch"),
            buffer_multiplier: 3,
        },
        Arc::new(device.clone()),
    );
    let output = temp_dir.path().join("quiet.wav");

    recorder.start(Some(output.clone()), ".wav").await?;
    tokio::time::timeout(Duration::from_secs(5), async {
        while !device.is_drained() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    recorder.stop().await?;

    let recording = RecordedFile::open(&output)?;
    assert_eq!(recording.frames, 6 * 1024);
    assert!(recording.is_silent());

    Ok(())
}
