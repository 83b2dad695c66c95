//! Directory notification sources.
//!
//! Wraps `notify` behind the [`EventSource`] trait so the orchestrator only
//! sees `(kind, name)` pairs and never the backend that produced them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::WatcherError;

/// What happened to a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// Content was written to an existing file.
    Modify,
    /// A file appeared under this name (created or renamed into place).
    Create,
}

/// A single filesystem event, reduced to the entry's base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub name: String,
}

impl FsEvent {
    #[must_use]
    pub fn modify(name: impl Into<String>) -> Self {
        Self {
            kind: FsEventKind::Modify,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn create(name: impl Into<String>) -> Self {
        Self {
            kind: FsEventKind::Create,
            name: name.into(),
        }
    }
}

/// A lazy, non-restartable stream of directory events.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event.
    ///
    /// Returns `None` once the source has been closed; errors are
    /// per-event and do not end the stream.
    async fn next(&mut self) -> Option<Result<FsEvent, WatcherError>>;

    /// Stop producing events and release backend resources.
    fn close(&mut self);
}

/// How a backend reports one rename inside the watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameStyle {
    /// Raw `notify`: `From`, then `To`, then a `Both` repeating the pair.
    Split,
    /// Debounced: a matched pair is stitched into a single `Both`; an
    /// unmatched move-in stays `To`.
    Stitched,
}

/// Keeps the OS watch registration alive; dropping it unregisters.
enum Backend {
    Raw(RecommendedWatcher),
    Debounced(Debouncer<RecommendedWatcher, RecommendedCache>),
}

/// [`EventSource`] backed by `notify`, optionally debounced.
///
/// Closing happens through the [`CancellationToken`] given at open time,
/// which may be cancelled from any task while [`EventSource::next`] is
/// pending.
pub struct NotifySource {
    directory: PathBuf,
    backend: Option<Backend>,
    events: mpsc::UnboundedReceiver<Result<FsEvent, WatcherError>>,
    closed: CancellationToken,
}

impl NotifySource {
    /// Watch `directory` with the platform's native backend.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::WatchInit`] if the directory cannot be watched.
    pub fn open(directory: &Path, closed: CancellationToken) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let init_err = |source| WatcherError::WatchInit {
            path: directory.to_path_buf(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for fs_event in translate(&event, RenameStyle::Split) {
                        let _ = tx.send(Ok(fs_event));
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(WatcherError::Notify(e)));
                }
            }
        })
        .map_err(init_err)?;
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(init_err)?;

        tracing::debug!(directory = %directory.display(), "Directory watch registered");
        Ok(Self {
            directory: directory.to_path_buf(),
            backend: Some(Backend::Raw(watcher)),
            events: rx,
            closed: closed.child_token(),
        })
    }

    /// Watch `directory` through `notify-debouncer-full`, coalescing bursts
    /// within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::WatchInit`] if the directory cannot be watched.
    pub fn open_debounced(
        directory: &Path,
        timeout: Duration,
        closed: CancellationToken,
    ) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let init_err = |source| WatcherError::WatchInit {
            path: directory.to_path_buf(),
            source,
        };

        let mut debouncer = new_debouncer(timeout, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in &events {
                        for fs_event in translate(event, RenameStyle::Stitched) {
                            let _ = tx.send(Ok(fs_event));
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        let _ = tx.send(Err(WatcherError::Notify(e)));
                    }
                }
            }
        })
        .map_err(init_err)?;
        debouncer
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(init_err)?;

        tracing::debug!(
            directory = %directory.display(),
            timeout_ms = timeout.as_millis(),
            "Debounced directory watch registered"
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            backend: Some(Backend::Debounced(debouncer)),
            events: rx,
            closed: closed.child_token(),
        })
    }
}

#[async_trait]
impl EventSource for NotifySource {
    async fn next(&mut self) -> Option<Result<FsEvent, WatcherError>> {
        if self.backend.is_none() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.closed.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    fn close(&mut self) {
        self.closed.cancel();
        if let Some(backend) = self.backend.take() {
            match backend {
                Backend::Raw(watcher) => drop(watcher),
                Backend::Debounced(debouncer) => debouncer.stop(),
            }
            self.events.close();
            tracing::debug!(directory = %self.directory.display(), "Directory watch released");
        }
    }
}

impl Drop for NotifySource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reduce a `notify` event to the modify/create pairs the tailer cares about.
///
/// Each rename yields at most one `Create` for its destination.
fn translate(event: &Event, renames: RenameStyle) -> Vec<FsEvent> {
    let kind = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            FsEventKind::Create
        }
        // Only the destination of a paired rename is a new file.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both))
            if renames == RenameStyle::Stitched =>
        {
            return event
                .paths
                .get(1)
                .and_then(|p| base_name(p))
                .map(FsEvent::create)
                .into_iter()
                .collect();
        }
        EventKind::Modify(ModifyKind::Name(_) | ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => FsEventKind::Modify,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter_map(|p| base_name(p))
        .map(|name| FsEvent { kind, name })
        .collect()
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
