// Microphone input via cpal
//
// cpal delivers samples from its own audio thread through a callback. The
// callback converts them to mono 16-bit little-endian bytes and pushes them
// into a bounded queue; `read_block` blocks on that queue until a full block
// is available, which gives the capture loop the pull-style contract it
// expects.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize,
};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use super::backend::{BlockRead, SampleDevice, SampleSource};
use super::format::PcmFormat;
use crate::error::{RecorderError, SourceError};

/// Minimum buffer assumed when the host does not report one
const FALLBACK_MIN_BUFFER_MS: u64 = 20;

/// Queue capacity in blocks before the oldest audio is dropped
const QUEUE_CAPACITY_BLOCKS: usize = 32;

/// Default system microphone
pub struct MicrophoneDevice {
    name: String,
}

impl MicrophoneDevice {
    pub fn new() -> Self {
        let name = cpal::default_host()
            .default_input_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_else(|| "default input".to_string());

        Self { name }
    }
}

impl Default for MicrophoneDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleDevice for MicrophoneDevice {
    fn open(
        &self,
        format: PcmFormat,
        buffer_multiplier: usize,
    ) -> Result<Box<dyn SampleSource>, RecorderError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| RecorderError::DeviceUnavailable("No audio input device found".into()))?;

        let negotiated = negotiate(&device, format)?;
        let multiplier = buffer_multiplier.max(1);
        let frame_bytes = format.block_align() as usize;
        let block_size = negotiated.min_frames as usize * frame_bytes * multiplier;

        info!(
            "Opening microphone '{}': {}Hz, {} device channel(s), {:?}, {} byte blocks",
            self.name,
            format.sample_rate,
            negotiated.config.channels,
            negotiated.sample_format,
            block_size
        );

        let queue = Arc::new(CaptureQueue::new(block_size * QUEUE_CAPACITY_BLOCKS, frame_bytes));

        let mut config = negotiated.config.clone();
        if negotiated.reported_minimum {
            config.buffer_size = BufferSize::Fixed(negotiated.min_frames * multiplier as u32);
        }

        let stream = match build_stream(&device, &config, negotiated.sample_format, &queue) {
            Ok(stream) => stream,
            Err(e) if negotiated.reported_minimum => {
                warn!("Fixed buffer size rejected ({}), retrying with host default", e);
                config.buffer_size = BufferSize::Default;
                build_stream(&device, &config, negotiated.sample_format, &queue)?
            }
            Err(e) => return Err(e),
        };

        // Only start a stream that was constructed successfully
        stream
            .play()
            .map_err(|e| RecorderError::DeviceUnavailable(format!("Failed to start stream: {}", e)))?;

        let block_duration = Duration::from_millis(format.duration_millis(block_size as u64).max(1));

        Ok(Box::new(MicrophoneSource {
            stream: Some(stream),
            queue,
            block_size,
            max_wait: block_duration * 2,
        }))
    }

    fn is_available(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct Negotiated {
    config: StreamConfig,
    sample_format: SampleFormat,
    min_frames: u32,
    reported_minimum: bool,
}

/// Pick an input config that runs at the requested rate, preferring the
/// requested channel count
fn negotiate(device: &cpal::Device, format: PcmFormat) -> Result<Negotiated, RecorderError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| RecorderError::DeviceUnavailable(format!("Failed to query configs: {}", e)))?;

    let rate = SampleRate(format.sample_rate);
    let mut best: Option<cpal::SupportedStreamConfigRange> = None;

    for range in ranges {
        if !matches!(
            range.sample_format(),
            SampleFormat::I16 | SampleFormat::F32 | SampleFormat::U16
        ) {
            continue;
        }
        if range.min_sample_rate() > rate || range.max_sample_rate() < rate {
            continue;
        }

        let is_better = match &best {
            None => true,
            Some(current) => {
                let wanted = format.channels;
                let distance = |c: u16| (c as i32 - wanted as i32).abs();
                distance(range.channels()) < distance(current.channels())
            }
        };
        if is_better {
            best = Some(range);
        }
    }

    let supported = best
        .ok_or_else(|| {
            RecorderError::DeviceUnavailable(format!(
                "Input device does not support {}Hz capture",
                format.sample_rate
            ))
        })?
        .with_sample_rate(rate);

    let fallback_frames = (format.sample_rate as u64 * FALLBACK_MIN_BUFFER_MS / 1000) as u32;
    let (min_frames, reported_minimum) = match supported.buffer_size() {
        SupportedBufferSize::Range { min, .. } if *min > 0 => (*min, true),
        _ => (fallback_frames, false),
    };

    Ok(Negotiated {
        sample_format: supported.sample_format(),
        config: supported.config(),
        min_frames,
        reported_minimum,
    })
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    queue: &Arc<CaptureQueue>,
) -> Result<Stream, RecorderError> {
    match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(device, config, queue),
        SampleFormat::U16 => build_stream_typed::<u16>(device, config, queue),
        SampleFormat::F32 => build_stream_typed::<f32>(device, config, queue),
        other => Err(RecorderError::DeviceUnavailable(format!(
            "Unsupported sample format {:?}",
            other
        ))),
    }
}

fn build_stream_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: &Arc<CaptureQueue>,
) -> Result<Stream, RecorderError>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let data_queue = Arc::clone(queue);
    let error_queue = Arc::clone(queue);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                data_queue.push_frames(data, channels);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_queue.fail(err.to_string());
            },
            None,
        )
        .map_err(|e| RecorderError::DeviceUnavailable(format!("Failed to build stream: {}", e)))
}

#[derive(Default)]
struct QueueState {
    bytes: VecDeque<u8>,
    failure: Option<String>,
    overruns: u64,
}

/// Bounded byte queue between the cpal callback and `read_block`
struct CaptureQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
    frame_bytes: usize,
}

impl CaptureQueue {
    fn new(capacity: usize, frame_bytes: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            capacity,
            frame_bytes: frame_bytes.max(1),
        }
    }

    /// Downmix interleaved frames to mono i16 and enqueue them
    fn push_frames<T>(&self, data: &[T], channels: usize)
    where
        T: SizedSample,
        i16: FromSample<T>,
    {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        for frame in data.chunks(channels) {
            let sum: i32 = frame.iter().map(|&s| s.to_sample::<i16>() as i32).sum();
            let mono = (sum / frame.len() as i32) as i16;
            state.bytes.extend(mono.to_le_bytes());
        }

        if state.bytes.len() > self.capacity {
            let excess = state.bytes.len() - self.capacity;
            let excess = excess.div_ceil(self.frame_bytes) * self.frame_bytes;
            state.bytes.drain(..excess.min(state.bytes.len()));
            state.overruns += 1;
        }

        drop(state);
        self.ready.notify_one();
    }

    fn fail(&self, message: String) {
        if let Ok(mut state) = self.state.lock() {
            state.failure.get_or_insert(message);
        }
        self.ready.notify_all();
    }
}

struct MicrophoneSource {
    stream: Option<Stream>,
    queue: Arc<CaptureQueue>,
    block_size: usize,
    max_wait: Duration,
}

impl SampleSource for MicrophoneSource {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<BlockRead, SourceError> {
        let poisoned = |_| SourceError::Read("capture queue poisoned".to_string());
        let mut state = self.queue.state.lock().map_err(poisoned)?;

        while state.bytes.len() < buf.len() && state.failure.is_none() {
            let (guard, timeout) = self
                .queue
                .ready
                .wait_timeout(state, self.max_wait)
                .map_err(|_| SourceError::Read("capture queue poisoned".to_string()))?;
            state = guard;
            if timeout.timed_out() && state.bytes.len() < buf.len() {
                return Ok(BlockRead::NoData);
            }
        }

        if let Some(failure) = state.failure.clone() {
            return Err(SourceError::Disconnected(failure));
        }

        for (dst, src) in buf.iter_mut().zip(state.bytes.drain(..buf.len())) {
            *dst = src;
        }

        Ok(BlockRead::Data(buf.len()))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let paused = stream.pause();
        drop(stream);

        if let Ok(state) = self.queue.state.lock() {
            if state.overruns > 0 {
                warn!(
                    "Microphone queue overflowed {} time(s), audio was dropped",
                    state.overruns
                );
            }
        }

        paused.map_err(|e| SourceError::Disconnected(format!("Failed to stop stream: {}", e)))
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        if self.stream.is_some() {
            if let Err(e) = self.close() {
                warn!("Failed to release microphone on drop: {}", e);
            }
        }
    }
}
