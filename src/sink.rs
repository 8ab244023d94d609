//! Shared append-only file sink used by every exporter in this crate.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// An append-only destination file guarded by a lock.
///
/// The file is opened lazily, on the first write, and the handle is kept for
/// subsequent writes. A failed write discards the handle so the next write
/// reopens the path. Writers serialize on the internal lock, so concurrent
/// callers never interleave partial records.
#[derive(Debug)]
pub(crate) struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    pub(crate) fn new(path: PathBuf) -> Self {
        FileSink {
            path,
            file: Mutex::new(None),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `buf` to the destination in one write, opening the file if
    /// needed, and flushes it.
    pub(crate) fn append(&self, buf: &str) -> io::Result<()> {
        let mut guard = self.lock()?;
        let file = match guard.take() {
            Some(file) => guard.insert(file),
            None => guard.insert(self.open()?),
        };
        let written = file.write_all(buf.as_bytes()).and_then(|()| file.flush());
        if let Err(error) = written {
            // Drop the handle; the next append starts over from open().
            *guard = None;
            tracing::warn!(
                path = %self.path.display(),
                %error,
                "telemetry file write failed; handle discarded",
            );
            return Err(error);
        }
        Ok(())
    }

    /// Flushes the open handle, if any.
    pub(crate) fn flush(&self) -> io::Result<()> {
        match self.lock()?.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Flushes and closes the destination. Safe to call more than once; the
    /// sink reopens only if written to again.
    pub(crate) fn close(&self) -> io::Result<()> {
        match self.lock()?.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Option<File>>> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "telemetry file lock poisoned"))
    }
}
