// Scripted sample device
//
// Replays a fixed sequence of read outcomes so the capture loop and the WAV
// container writer can be exercised without hardware. Clones share the same
// script, so a test can keep a handle and watch the capture thread drain it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::backend::{BlockRead, SampleDevice, SampleSource};
use super::format::PcmFormat;
use crate::error::{RecorderError, SourceError};

/// Pause between polls once the script is exhausted
const IDLE_POLL: Duration = Duration::from_millis(2);

/// One scripted read outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    /// Deliver these bytes (truncated to the block size)
    Block(Vec<u8>),
    /// Transient invalid operation
    NoData,
    /// Unrecoverable device error
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<MockRead>,
    open_count: usize,
    close_count: usize,
}

/// Deterministic stand-in for a microphone
#[derive(Debug, Clone)]
pub struct MockDevice {
    block_size: usize,
    available: bool,
    endless_silence: bool,
    fail_close: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Device that replays its script, then reports no data until closed
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            available: true,
            endless_silence: false,
            fail_close: false,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Device that produces real-time paced silence once its script is empty
    pub fn silence(block_size: usize) -> Self {
        Self {
            endless_silence: true,
            ..Self::new(block_size)
        }
    }

    /// Device that fails to initialize
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Device whose release reports an error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Append `count` blocks of zero bytes
    pub fn with_zero_blocks(self, count: usize) -> Self {
        for _ in 0..count {
            self.push(MockRead::Block(vec![0u8; self.block_size]));
        }
        self
    }

    /// Append a block of the given bytes
    pub fn with_block(self, bytes: Vec<u8>) -> Self {
        self.push(MockRead::Block(bytes));
        self
    }

    /// Append a transient no-data cycle
    pub fn with_no_data(self) -> Self {
        self.push(MockRead::NoData);
        self
    }

    /// Append a fatal read error
    pub fn with_failure(self, message: &str) -> Self {
        self.push(MockRead::Fail(message.to_string()));
        self
    }

    /// Append an outcome to the script
    pub fn push(&self, read: MockRead) {
        self.state().script.push_back(read);
    }

    /// Whether every scripted outcome has been consumed
    pub fn is_drained(&self) -> bool {
        self.state().script.is_empty()
    }

    /// Number of times the device was opened
    pub fn open_count(&self) -> usize {
        self.state().open_count
    }

    /// Number of times a source from this device was closed
    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SampleDevice for MockDevice {
    fn open(
        &self,
        format: PcmFormat,
        _buffer_multiplier: usize,
    ) -> Result<Box<dyn SampleSource>, RecorderError> {
        if !self.available {
            return Err(RecorderError::DeviceUnavailable(
                "mock device is unavailable".to_string(),
            ));
        }

        self.state().open_count += 1;
        debug!("Mock device opened ({} byte blocks)", self.block_size);

        Ok(Box::new(MockSource {
            device: self.clone(),
            block_duration: Duration::from_millis(
                format.duration_millis(self.block_size as u64).max(1),
            ),
        }))
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockSource {
    device: MockDevice,
    block_duration: Duration,
}

impl SampleSource for MockSource {
    fn block_size(&self) -> usize {
        self.device.block_size
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<BlockRead, SourceError> {
        let next = self.device.state().script.pop_front();

        match next {
            Some(MockRead::Block(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(BlockRead::Data(n))
            }
            Some(MockRead::NoData) => Ok(BlockRead::NoData),
            Some(MockRead::Fail(message)) => Err(SourceError::Read(message)),
            None if self.device.endless_silence => {
                std::thread::sleep(self.block_duration);
                buf.fill(0);
                Ok(BlockRead::Data(buf.len()))
            }
            None => {
                std::thread::sleep(IDLE_POLL);
                Ok(BlockRead::NoData)
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.device.state().close_count += 1;
        if self.device.fail_close {
            return Err(SourceError::Disconnected("mock release failed".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::RECORDING_FORMAT;

    #[test]
    fn replays_script_in_order() {
        let device = MockDevice::new(4)
            .with_block(vec![1, 2, 3, 4])
            .with_no_data()
            .with_failure("boom");

        let mut source = device.open(RECORDING_FORMAT, 3).unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(source.read_block(&mut buf).unwrap(), BlockRead::Data(4));
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(source.read_block(&mut buf).unwrap(), BlockRead::NoData);
        assert!(source.read_block(&mut buf).is_err());
        assert!(device.is_drained());
    }

    #[test]
    fn drained_script_reports_no_data() {
        let device = MockDevice::new(8);
        let mut source = device.open(RECORDING_FORMAT, 3).unwrap();
        let mut buf = [0u8; 8];

        assert_eq!(source.read_block(&mut buf).unwrap(), BlockRead::NoData);
    }

    #[test]
    fn oversized_block_is_truncated() {
        let device = MockDevice::new(2).with_block(vec![9, 9, 9]);
        let mut source = device.open(RECORDING_FORMAT, 3).unwrap();
        let mut buf = [0u8; 2];

        assert_eq!(source.read_block(&mut buf).unwrap(), BlockRead::Data(2));
    }

    #[test]
    fn unavailable_device_fails_open() {
        let device = MockDevice::new(8).unavailable();

        assert!(!device.is_available());
        assert!(matches!(
            device.open(RECORDING_FORMAT, 3),
            Err(RecorderError::DeviceUnavailable(_))
        ));
        assert_eq!(device.open_count(), 0);
    }

    #[test]
    fn close_is_counted() {
        let device = MockDevice::new(8).failing_close();
        let mut source = device.open(RECORDING_FORMAT, 3).unwrap();

        assert!(source.close().is_err());
        assert_eq!(device.close_count(), 1);
    }
}
