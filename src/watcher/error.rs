//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while watching and tailing the target file.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// The directory could not be registered with the notification backend.
    #[error("Cannot watch directory {path}: {source}")]
    WatchInit {
        path: PathBuf,
        source: notify::Error,
    },

    /// The target file could not be opened.
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading appended bytes failed.
    #[error("Read failed on {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The notification backend reported an error after startup.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A line grew past the configured limit before its terminator arrived.
    #[error("Line exceeds {limit} bytes, discarded")]
    LineTooLong { limit: usize },
}
