//! Incremental file tailer.
//!
//! Holds the single open handle to the target file and reads only bytes
//! appended after it was opened.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::WatcherError;

/// Bytes requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Pause between closing the old handle and reopening the path on rotation.
pub const DEFAULT_ROTATION_GRACE: Duration = Duration::from_millis(100);

/// What [`TailCursor::rotate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Now reading the file found at the path, from its end.
    Reopened,
    /// The path still names the open file; the handle and offset are kept.
    Unchanged,
    /// Nothing could be opened at the path; the cursor holds no handle.
    Closed,
}

/// Read cursor over the tail of a file.
///
/// The handle is positioned at end-of-file when opened, so content present
/// before startup (or before a rotation) is never replayed.
#[derive(Debug)]
pub struct TailCursor {
    /// Path to the file, reopened on rotation.
    path: PathBuf,
    /// Current handle; `None` after a failed reopen or after close.
    file: Option<File>,
    /// Byte offset of the next read in the current handle.
    offset: u64,
    chunk_size: usize,
    rotation_grace: Duration,
}

impl TailCursor {
    /// Open `path` and seek to its end.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::Open`] if the file is missing or unreadable.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, WatcherError> {
        let path = path.into();
        let (file, offset) = open_at_end(&path)
            .await
            .map_err(|source| WatcherError::Open {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), offset, "Opened file at end");
        Ok(Self {
            path,
            file: Some(file),
            offset,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rotation_grace: DEFAULT_ROTATION_GRACE,
        })
    }

    /// Set the per-read chunk size (minimum 1 byte).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the rotation grace interval.
    #[must_use]
    pub fn with_rotation_grace(mut self, grace: Duration) -> Self {
        self.rotation_grace = grace;
        self
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a handle is currently held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Perform one bounded read of whatever was appended since the last read.
    ///
    /// Returns an empty buffer when nothing new is available or when the
    /// cursor holds no handle. If the file shrank below the current offset
    /// (truncated in place), reading restarts from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::Read`] on I/O failure.
    pub async fn read_new_bytes(&mut self) -> Result<Vec<u8>, WatcherError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };
        let read_err = |source| WatcherError::Read {
            path: self.path.clone(),
            source,
        };

        let file_len = file.metadata().await.map_err(read_err)?.len();
        if file_len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "File truncated, resetting offset to 0"
            );
            file.seek(SeekFrom::Start(0)).await.map_err(read_err)?;
            self.offset = 0;
        }

        let mut buf = vec![0; self.chunk_size];
        let n = loop {
            match file.read(&mut buf).await {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_err(e)),
            }
        };
        buf.truncate(n);
        self.offset += n as u64;
        Ok(buf)
    }

    /// Swap to the file now living at the path.
    ///
    /// Closes the current handle, waits the grace interval, and reopens at
    /// the new file's end. A failed reopen leaves the cursor closed; the
    /// next creation event retries. If the path already refers to the open
    /// file, nothing is closed.
    pub async fn rotate(&mut self) -> Rotation {
        if self.holds_current_file().await {
            tracing::debug!(path = %self.path.display(), "Path still names the open file");
            return Rotation::Unchanged;
        }

        self.close();
        tokio::time::sleep(self.rotation_grace).await;

        match open_at_end(&self.path).await {
            Ok((file, offset)) => {
                tracing::info!(path = %self.path.display(), offset, "Reopened file after rotation");
                self.file = Some(file);
                self.offset = offset;
                Rotation::Reopened
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Reopen after rotation failed, waiting for next create event"
                );
                Rotation::Closed
            }
        }
    }

    /// Whether the open handle and the path share a device and inode.
    #[cfg(unix)]
    async fn holds_current_file(&self) -> bool {
        use std::os::unix::fs::MetadataExt;

        let Some(file) = self.file.as_ref() else {
            return false;
        };
        match (file.metadata().await, tokio::fs::metadata(&self.path).await) {
            (Ok(open), Ok(named)) => open.dev() == named.dev() && open.ino() == named.ino(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    #[allow(clippy::unused_async)]
    async fn holds_current_file(&self) -> bool {
        false
    }

    /// Release the handle.
    pub fn close(&mut self) {
        self.file = None;
        self.offset = 0;
    }
}

async fn open_at_end(path: &Path) -> std::io::Result<(File, u64)> {
    let mut file = File::open(path).await?;
    let offset = file.seek(SeekFrom::End(0)).await?;
    Ok((file, offset))
}
