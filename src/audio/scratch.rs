use anyhow::Context;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appends raw PCM blocks to a headerless scratch file
///
/// The scratch file knows nothing about the final container; it is pure
/// sequential append with no seeking or framing.
pub struct ScratchWriter<W: Write = BufWriter<File>> {
    writer: Option<W>,
    path: PathBuf,
    bytes_written: u64,
}

impl ScratchWriter {
    /// Create (or truncate) the scratch file, creating parent directories
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        debug!("Scratch file opened: {}", path.display());

        Ok(Self::from_writer(BufWriter::new(file), path))
    }

    /// Flush, sync to disk and release the file; idempotent
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        Ok(())
    }
}

impl<W: Write> ScratchWriter<W> {
    /// Wrap an arbitrary writer; `path` is only used for reporting
    pub fn from_writer(writer: W, path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Some(writer),
            path: path.into(),
            bytes_written: 0,
        }
    }

    /// Append one block
    pub fn append(&mut self, block: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "scratch file is closed"))?;

        writer.write_all(block)?;
        self.bytes_written += block.len() as u64;
        Ok(())
    }

    /// Flush and release the underlying handle; idempotent
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Bytes successfully appended so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

/// Delete a scratch file, treating "already gone" as success
pub fn remove_scratch(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to delete scratch file {:?}", path)),
    }
}
