// Capture loop
//
// One dedicated blocking thread per session pulls PCM blocks from the sample
// source and appends them to the scratch file until the shared running flag
// is cleared. The thread owns the source and the scratch writer exclusively;
// the controller only sees the flag, the readiness handshake and the final
// `CaptureReport` returned on join.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::backend::{BlockRead, SampleDevice, SampleSource};
use super::format::PcmFormat;
use super::scratch::{remove_scratch, ScratchWriter};
use crate::error::RecorderError;

/// Consecutive failed appends after which the scratch stream is considered lost
pub const MAX_CONSECUTIVE_APPEND_FAILURES: u32 = 8;

/// Reusable buffer for one read cycle
pub struct PcmBlock {
    buf: Vec<u8>,
    len: usize,
}

impl PcmBlock {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            len: 0,
        }
    }

    /// Whole buffer, for the source to fill
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.len = 0;
        &mut self.buf
    }

    /// Mark the first `len` bytes as valid
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    /// Valid bytes of the last read
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// What the capture thread reports when joined
#[derive(Debug, Clone, Default)]
pub struct CaptureReport {
    /// Bytes appended to the scratch file
    pub bytes_captured: u64,
    /// Blocks appended to the scratch file
    pub blocks_written: u64,
    /// Read cycles that produced no data
    pub empty_reads: u64,
    /// Appends that failed and were skipped
    pub failed_appends: u64,
    /// The device reported an error while being released
    pub release_failed: bool,
    /// Unrecoverable error that ended capture early
    pub fatal: Option<String>,
}

/// Whether an append error means the handle itself is gone
fn is_stream_lost(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
    )
}

/// Pull blocks from `source` into `writer` while `running` is set
///
/// Transient no-data cycles are skipped. Failed appends are logged and
/// counted; capture only halts when the scratch stream is lost or the device
/// fails a read.
pub fn run_capture_loop<W: Write>(
    source: &mut dyn SampleSource,
    writer: &mut ScratchWriter<W>,
    running: &AtomicBool,
) -> CaptureReport {
    let mut report = CaptureReport::default();
    let mut block = PcmBlock::new(source.block_size());
    let mut consecutive_failures = 0u32;

    while running.load(Ordering::SeqCst) {
        match source.read_block(block.buffer_mut()) {
            Ok(BlockRead::Data(n)) if n > 0 => {
                block.set_len(n);

                match writer.append(block.as_bytes()) {
                    Ok(()) => {
                        consecutive_failures = 0;
                        report.blocks_written += 1;
                        report.bytes_captured += block.as_bytes().len() as u64;
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        report.failed_appends += 1;

                        if is_stream_lost(&e)
                            || consecutive_failures >= MAX_CONSECUTIVE_APPEND_FAILURES
                        {
                            error!(
                                "Scratch stream lost after {} failure(s): {}",
                                consecutive_failures, e
                            );
                            report.fatal = Some(format!("scratch file write failed: {}", e));
                            break;
                        }

                        warn!("Failed to append PCM block to scratch file: {}", e);
                    }
                }
            }
            Ok(_) => {
                report.empty_reads += 1;
            }
            Err(e) => {
                error!("Sample source '{}' failed: {}", source.name(), e);
                report.fatal = Some(e.to_string());
                break;
            }
        }
    }

    report
}

/// Handle to a running capture thread
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    abandoned: Arc<AtomicBool>,
    task: Option<JoinHandle<CaptureReport>>,
    block_size: usize,
}

impl CaptureHandle {
    /// Open the device and scratch file on a dedicated thread and start
    /// capturing
    ///
    /// Returns once the device is recording; never waits for the loop.
    pub async fn launch(
        device: Arc<dyn SampleDevice>,
        format: PcmFormat,
        buffer_multiplier: usize,
        scratch_path: PathBuf,
    ) -> Result<Self, RecorderError> {
        let running = Arc::new(AtomicBool::new(true));
        let abandoned = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_running = Arc::clone(&running);
        let thread_abandoned = Arc::clone(&abandoned);
        let task = tokio::task::spawn_blocking(move || {
            capture_thread(
                device,
                format,
                buffer_multiplier,
                scratch_path,
                thread_running,
                thread_abandoned,
                ready_tx,
            )
        });

        match ready_rx.await {
            Ok(Ok(block_size)) => Ok(Self {
                running,
                abandoned,
                task: Some(task),
                block_size,
            }),
            Ok(Err(e)) => {
                let _ = task.await;
                Err(e)
            }
            Err(_) => match task.await {
                Ok(report) => Err(RecorderError::CaptureFailed(
                    report
                        .fatal
                        .unwrap_or_else(|| "capture thread exited before starting".to_string()),
                )),
                Err(e) => Err(RecorderError::CaptureFailed(format!(
                    "capture thread panicked: {}",
                    e
                ))),
            },
        }
    }

    /// Capture block size negotiated with the device
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether the loop has not been told to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the loop to halt and wait for the thread to exit
    ///
    /// When this returns the source is released and the scratch file is
    /// flushed and closed.
    pub async fn stop(mut self) -> Result<CaptureReport, RecorderError> {
        self.running.store(false, Ordering::SeqCst);

        let Some(task) = self.task.take() else {
            return Ok(CaptureReport::default());
        };

        task.await
            .map_err(|e| RecorderError::CaptureFailed(format!("capture thread panicked: {}", e)))
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        // Nobody will finalize the scratch file: the thread discards it
        if self.task.is_some() {
            self.abandoned.store(true, Ordering::SeqCst);
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

fn capture_thread(
    device: Arc<dyn SampleDevice>,
    format: PcmFormat,
    buffer_multiplier: usize,
    scratch_path: PathBuf,
    running: Arc<AtomicBool>,
    abandoned: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<usize, RecorderError>>,
) -> CaptureReport {
    // Device first: an unavailable device must not leave a scratch file behind
    let mut source = match device.open(format, buffer_multiplier) {
        Ok(source) => source,
        Err(e) => {
            let _ = ready.send(Err(e));
            return CaptureReport::default();
        }
    };

    let mut writer = match ScratchWriter::create(&scratch_path) {
        Ok(writer) => writer,
        Err(e) => {
            let mut report = CaptureReport::default();
            release_source(source.as_mut(), &mut report);
            let _ = ready.send(Err(e.into()));
            return report;
        }
    };

    if ready.send(Ok(source.block_size())).is_err() {
        warn!("Recorder went away before capture started, discarding scratch file");
        let mut report = CaptureReport::default();
        release_source(source.as_mut(), &mut report);
        let _ = writer.close();
        if let Err(e) = remove_scratch(&scratch_path) {
            warn!("{:#}", e);
        }
        return report;
    }

    info!(
        "Capture loop started: {} -> {} ({} byte blocks)",
        source.name(),
        scratch_path.display(),
        source.block_size()
    );

    let mut report = run_capture_loop(source.as_mut(), &mut writer, &running);

    // Draining: release the device, then flush and close the scratch file
    release_source(source.as_mut(), &mut report);

    if let Err(e) = writer.finish() {
        error!("Failed to close scratch file {}: {}", scratch_path.display(), e);
        report
            .fatal
            .get_or_insert_with(|| format!("scratch file close failed: {}", e));
    }

    if abandoned.load(Ordering::SeqCst) {
        warn!("Capture abandoned without stop, discarding scratch file");
        if let Err(e) = remove_scratch(&scratch_path) {
            warn!("{:#}", e);
        }
    }

    info!(
        "Capture loop stopped: {} bytes in {} blocks ({} empty reads, {} failed appends)",
        report.bytes_captured, report.blocks_written, report.empty_reads, report.failed_appends
    );

    report
}

fn release_source(source: &mut dyn SampleSource, report: &mut CaptureReport) {
    if let Err(e) = source.close() {
        warn!("Failed to release sample source '{}': {}", source.name(), e);
        report.release_failed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::RECORDING_FORMAT;
    use crate::audio::mock::MockDevice;
    use crate::error::SourceError;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Clears the running flag once the mock script is exhausted
    struct StopWhenDrained<'a> {
        inner: Box<dyn SampleSource>,
        device: MockDevice,
        running: &'a AtomicBool,
    }

    impl SampleSource for StopWhenDrained<'_> {
        fn block_size(&self) -> usize {
            self.inner.block_size()
        }

        fn read_block(&mut self, buf: &mut [u8]) -> Result<BlockRead, SourceError> {
            let read = self.inner.read_block(buf);
            if self.device.is_drained() {
                self.running.store(false, Ordering::SeqCst);
            }
            read
        }

        fn close(&mut self) -> Result<(), SourceError> {
            self.inner.close()
        }

        fn name(&self) -> &str {
            "stop-when-drained"
        }
    }

    /// Fails a fixed number of writes with the given kind, then succeeds
    struct FlakyWriter {
        failures_left: usize,
        kind: io::ErrorKind,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::new(self.kind, "injected failure"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_with(device: &MockDevice, writer: &mut ScratchWriter<impl Write>) -> CaptureReport {
        let running = AtomicBool::new(true);
        let mut source = StopWhenDrained {
            inner: device.open(RECORDING_FORMAT, 3).unwrap(),
            device: device.clone(),
            running: &running,
        };
        run_capture_loop(&mut source, writer, &running)
    }

    #[test]
    fn writes_blocks_in_order() {
        let device = MockDevice::new(4)
            .with_block(vec![1, 2, 3, 4])
            .with_block(vec![5, 6, 7, 8]);
        let mut writer = ScratchWriter::from_writer(Vec::new(), "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.blocks_written, 2);
        assert_eq!(report.bytes_captured, 8);
        assert!(report.fatal.is_none());
        assert_eq!(writer.bytes_written(), 8);
    }

    #[test]
    fn short_block_writes_only_valid_bytes() {
        let device = MockDevice::new(4).with_block(vec![1, 2]);
        let mut writer = ScratchWriter::from_writer(Vec::new(), "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.bytes_captured, 2);
    }

    #[test]
    fn no_data_cycle_is_skipped() {
        let device = MockDevice::new(4)
            .with_zero_blocks(2)
            .with_no_data()
            .with_zero_blocks(7);
        let mut writer = ScratchWriter::from_writer(Vec::new(), "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.blocks_written, 9);
        assert_eq!(report.empty_reads, 1);
        assert!(report.fatal.is_none());
    }

    #[test]
    fn read_error_is_fatal() {
        let device = MockDevice::new(4)
            .with_zero_blocks(1)
            .with_failure("device unplugged")
            .with_zero_blocks(5);
        let mut writer = ScratchWriter::from_writer(Vec::new(), "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.blocks_written, 1);
        assert!(report.fatal.unwrap().contains("device unplugged"));
    }

    #[test]
    fn transient_append_failure_keeps_capturing() {
        let device = MockDevice::new(2).with_zero_blocks(5);
        let flaky = FlakyWriter {
            failures_left: 2,
            kind: io::ErrorKind::Other,
            data: Vec::new(),
        };
        let mut writer = ScratchWriter::from_writer(flaky, "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.failed_appends, 2);
        assert_eq!(report.blocks_written, 3);
        assert!(report.fatal.is_none());
    }

    #[test]
    fn lost_stream_halts_capture() {
        let device = MockDevice::new(2).with_zero_blocks(5);
        let flaky = FlakyWriter {
            failures_left: 1,
            kind: io::ErrorKind::BrokenPipe,
            data: Vec::new(),
        };
        let mut writer = ScratchWriter::from_writer(flaky, "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.blocks_written, 0);
        assert!(report.fatal.is_some());
    }

    #[test]
    fn repeated_append_failures_halt_capture() {
        let device = MockDevice::new(2).with_zero_blocks(20);
        let flaky = FlakyWriter {
            failures_left: usize::MAX,
            kind: io::ErrorKind::Other,
            data: Vec::new(),
        };
        let mut writer = ScratchWriter::from_writer(flaky, "mem.raw");

        let report = run_with(&device, &mut writer);

        assert_eq!(report.failed_appends, MAX_CONSECUTIVE_APPEND_FAILURES as u64);
        assert!(report.fatal.is_some());
    }

    #[test]
    fn pcm_block_tracks_valid_length() {
        let mut block = PcmBlock::new(8);
        block.buffer_mut()[..3].copy_from_slice(&[7, 8, 9]);
        block.set_len(3);

        assert_eq!(block.as_bytes(), &[7, 8, 9]);
        assert_eq!(block.capacity(), 8);

        block.set_len(100);
        assert_eq!(block.as_bytes().len(), 8);
    }

    #[tokio::test]
    async fn dropped_handle_discards_scratch_file() {
        let temp_dir = TempDir::new().unwrap();
        let scratch = temp_dir.path().join("abandoned.raw");

        let handle = CaptureHandle::launch(
            Arc::new(MockDevice::silence(64)),
            RECORDING_FORMAT,
            3,
            scratch.clone(),
        )
        .await
        .unwrap();
        assert!(scratch.exists());

        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), async {
            while scratch.exists() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scratch file was not removed after drop");
    }

    #[tokio::test]
    async fn stopped_handle_keeps_scratch_file() {
        let temp_dir = TempDir::new().unwrap();
        let scratch = temp_dir.path().join("kept.raw");
        let device = MockDevice::new(64).with_zero_blocks(3);

        let handle = CaptureHandle::launch(
            Arc::new(device.clone()),
            RECORDING_FORMAT,
            3,
            scratch.clone(),
        )
        .await
        .unwrap();
        while !device.is_drained() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let report = handle.stop().await.unwrap();

        assert_eq!(report.blocks_written, 3);
        assert_eq!(std::fs::metadata(&scratch).unwrap().len(), 192);
    }
}
