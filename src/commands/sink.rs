//! Mutex-guarded line output shared by concurrent shard threads and workers

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

/// Serializes writes so each call lands as one uninterrupted chunk
pub struct LineSink<W: Write> {
    inner: Mutex<W>,
    /// Flush after every write so partial results survive an abort
    flush_each: bool,
}

impl<W: Write> LineSink<W> {
    /// Flushes after every write
    pub fn durable(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
            flush_each: true,
        }
    }

    /// Flushes only on [`LineSink::flush`]
    pub fn buffered(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
            flush_each: false,
        }
    }

    /// Write `chunk`, which should end with a newline
    pub fn write(&self, chunk: impl AsRef<[u8]>) -> io::Result<()> {
        let mut writer = self.inner.lock();
        writer.write_all(chunk.as_ref())?;
        if self.flush_each {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// Keys one per line, bytes unchanged
pub fn key_lines(keys: &[Bytes]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(keys.iter().map(|k| k.len() + 1).sum());
    for key in keys {
        chunk.extend_from_slice(key);
        chunk.push(b'\n');
    }
    chunk
}

/// A kept (not auto-deleted) file created under `dir` with a unique suffix
pub fn create_log_file(dir: &Path, prefix: &str) -> io::Result<(File, PathBuf)> {
    let file = tempfile::Builder::new()
        .prefix(&sanitize(prefix))
        .suffix(".log")
        .tempfile_in(dir)?;
    file.keep().map_err(|e| e.error)
}

/// Path separators are not allowed in the prefix
fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
