//! Watcher module for a single tailed log file.
//!
//! Provides the notification source, the tail cursor, line reassembly and
//! pattern matching.

mod assembler;
mod error;
mod matcher;
mod source;
mod tailer;

pub use assembler::{LineAssembler, DEFAULT_MAX_LINE};
pub use error::WatcherError;
pub use matcher::{local_hostname, MatchRecord, Matcher};
pub use source::{EventSource, FsEvent, FsEventKind, NotifySource};
pub use tailer::{Rotation, TailCursor, DEFAULT_CHUNK_SIZE, DEFAULT_ROTATION_GRACE};
