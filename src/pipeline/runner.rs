//! The watch loop.
//!
//! Pulls events from an [`EventSource`] and, for the target file only, runs
//! appended bytes through the assembler, matcher and delivery client in
//! order. Every step is awaited before the next event is taken, so a slow
//! webhook holds events back at the notification layer.

use crate::delivery::{DeliveryClient, HttpWebhook, Webhook};
use crate::watcher::{
    EventSource, FsEvent, FsEventKind, LineAssembler, Matcher, Rotation, TailCursor,
    WatcherError,
};

use super::state::{WatchState, WatchStateMachine, WatchStats};

/// Drives tailing, matching and delivery for one file.
pub struct Orchestrator<S, W = HttpWebhook> {
    source: S,
    cursor: TailCursor,
    assembler: LineAssembler,
    matcher: Matcher,
    delivery: DeliveryClient<W>,
    /// Base name events are filtered on.
    file_name: String,
    state: WatchStateMachine,
}

impl<S: EventSource, W: Webhook> Orchestrator<S, W> {
    /// Assemble a loop from already-opened parts; starts in `Running`.
    #[must_use]
    pub fn new(
        source: S,
        cursor: TailCursor,
        assembler: LineAssembler,
        matcher: Matcher,
        delivery: DeliveryClient<W>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cursor,
            assembler,
            matcher,
            delivery,
            file_name: file_name.into(),
            state: WatchStateMachine::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        self.state.state()
    }

    #[must_use]
    pub fn stats(&self) -> WatchStats {
        self.state.stats()
    }

    /// Run until the event source closes, then release everything.
    pub async fn run(&mut self) -> WatchStats {
        tracing::info!(
            path = %self.cursor.path().display(),
            pattern = %self.matcher.pattern(),
            "Watching for matches"
        );

        while let Some(polled) = self.source.next().await {
            match polled {
                Ok(event) => self.handle_event(event).await,
                Err(e) => tracing::warn!(
                    path = %self.cursor.path().display(),
                    error = %e,
                    "Notification source error"
                ),
            }
        }

        self.shutdown();
        self.stats()
    }

    /// Handle one event; events for other names are ignored.
    pub async fn handle_event(&mut self, event: FsEvent) {
        if self.state.state() != WatchState::Running {
            return;
        }
        if event.name != self.file_name {
            tracing::trace!(name = %event.name, kind = ?event.kind, "Ignoring unrelated event");
            return;
        }

        match event.kind {
            FsEventKind::Modify => self.drain().await,
            FsEventKind::Create => self.rotate().await,
        }
    }

    /// Read until the cursor reports nothing new.
    async fn drain(&mut self) {
        loop {
            let chunk = match self.cursor.read_new_bytes().await {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(error = %e, "Read failed, waiting for next event");
                    return;
                }
            };
            if chunk.is_empty() {
                return;
            }

            for result in self.assembler.feed(&chunk) {
                match result {
                    Ok(line) => self.process_line(line).await,
                    Err(e @ WatcherError::LineTooLong { .. }) => {
                        self.state.record_oversized();
                        tracing::warn!(
                            path = %self.cursor.path().display(),
                            error = %e,
                            "Dropping over-length line"
                        );
                    }
                    Err(e) => tracing::warn!(error = %e, "Line assembly error"),
                }
            }
        }
    }

    async fn process_line(&mut self, line: String) {
        self.state.record_line();
        let Some(record) = self.matcher.check(line) else {
            return;
        };

        self.state.record_match();
        tracing::debug!(line = %record.line, "Line matched");
        let outcome = self.delivery.deliver(record).await;
        self.state.record_delivery(outcome.is_delivered());
    }

    async fn rotate(&mut self) {
        tracing::info!(
            path = %self.cursor.path().display(),
            "Target file recreated, reopening"
        );
        if self.cursor.rotate().await == Rotation::Unchanged {
            return;
        }
        // A partial line from the old file can never be completed.
        self.assembler.reset();
        self.state.record_rotation();
    }

    fn shutdown(&mut self) {
        self.state.transition(WatchState::ShuttingDown);
        self.source.close();
        self.cursor.close();
        self.state.transition(WatchState::Terminated);

        let stats = self.stats();
        tracing::info!(
            lines = stats.lines,
            matches = stats.matches,
            delivered = stats.delivered,
            failed = stats.failed,
            rotations = stats.rotations,
            "Watch stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{Backoff, DeliveryError, RetryPolicy};
    use async_trait::async_trait;
    use regex::Regex;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Hands out queued events, then reports closed.
    struct ScriptedSource {
        events: VecDeque<Result<FsEvent, WatcherError>>,
        closed: bool,
    }

    impl ScriptedSource {
        fn new(events: Vec<Result<FsEvent, WatcherError>>) -> Self {
            Self {
                events: events.into(),
                closed: false,
            }
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn next(&mut self) -> Option<Result<FsEvent, WatcherError>> {
            if self.closed {
                return None;
            }
            self.events.pop_front()
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    /// Records posted lines and answers with scripted statuses.
    #[derive(Clone, Default)]
    struct RecordingWebhook {
        lines: Arc<Mutex<Vec<String>>>,
        statuses: Arc<Mutex<VecDeque<u16>>>,
    }

    impl RecordingWebhook {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Webhook for RecordingWebhook {
        async fn post(&self, body: &[u8]) -> Result<u16, DeliveryError> {
            let value: serde_json::Value = serde_json::from_slice(body)?;
            self.lines
                .lock()
                .unwrap()
                .push(value["line"].as_str().unwrap_or_default().to_string());
            Ok(self.statuses.lock().unwrap().pop_front().unwrap_or(200))
        }
    }

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    async fn orchestrator(
        path: &Path,
        events: Vec<Result<FsEvent, WatcherError>>,
        max_line: usize,
    ) -> (Orchestrator<ScriptedSource, RecordingWebhook>, RecordingWebhook) {
        let cursor = TailCursor::open(path)
            .await
            .unwrap()
            .with_rotation_grace(Duration::ZERO);
        let webhook = RecordingWebhook::default();
        let delivery = DeliveryClient::new(
            webhook.clone(),
            RetryPolicy::new(2, Duration::from_millis(1), Backoff::Fixed),
        );
        let orch = Orchestrator::new(
            ScriptedSource::new(events),
            cursor,
            LineAssembler::new(max_line),
            Matcher::new(Regex::new("ERROR").unwrap(), "web-01"),
            delivery,
            "app.log",
        );
        (orch, webhook)
    }

    fn log_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("app.log");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_delivers_matching_appended_line() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "ERROR historical\n");
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 1024).await;

        append(&path, "2024 ERROR disk full\nno match here\n");
        orch.handle_event(FsEvent::modify("app.log")).await;

        assert_eq!(webhook.lines(), vec!["2024 ERROR disk full"]);
        assert_eq!(orch.stats().lines, 2);
        assert_eq!(orch.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 1024).await;

        append(&path, "ERROR pending\n");
        orch.handle_event(FsEvent::modify("other.log")).await;
        orch.handle_event(FsEvent::create("app.log.1")).await;
        assert!(webhook.lines().is_empty());
        assert_eq!(orch.stats().rotations, 0);

        orch.handle_event(FsEvent::modify("app.log")).await;
        assert_eq!(webhook.lines(), vec!["ERROR pending"]);
    }

    #[tokio::test]
    async fn test_partial_line_completes_on_later_event() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 1024).await;

        append(&path, "ERROR spl");
        orch.handle_event(FsEvent::modify("app.log")).await;
        assert!(webhook.lines().is_empty());

        append(&path, "it line\n");
        orch.handle_event(FsEvent::modify("app.log")).await;
        assert_eq!(webhook.lines(), vec!["ERROR split line"]);
    }

    #[tokio::test]
    async fn test_rotation_reads_only_new_file() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 1024).await;

        append(&path, "ERROR unterminated old");
        orch.handle_event(FsEvent::modify("app.log")).await;
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, "").unwrap();
        orch.handle_event(FsEvent::create("app.log")).await;

        append(&path, "ERROR new file\n");
        orch.handle_event(FsEvent::modify("app.log")).await;

        assert_eq!(webhook.lines(), vec!["ERROR new file"]);
        assert_eq!(orch.stats().rotations, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_duplicate_create_for_one_rename_rotates_once() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let staged = dir.path().join("app.log.new");
        std::fs::write(&staged, "").unwrap();
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 1024).await;

        std::fs::rename(&staged, &path).unwrap();
        orch.handle_event(FsEvent::create("app.log")).await;
        append(&path, "ERROR written between notifications\n");
        orch.handle_event(FsEvent::create("app.log")).await;
        orch.handle_event(FsEvent::modify("app.log")).await;

        assert_eq!(webhook.lines(), vec!["ERROR written between notifications"]);
        assert_eq!(orch.stats().rotations, 1);
    }

    #[tokio::test]
    async fn test_overlong_line_does_not_block_next() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 16).await;

        append(&path, &format!("ERROR {}\nERROR short\n", "x".repeat(64)));
        orch.handle_event(FsEvent::modify("app.log")).await;

        assert_eq!(webhook.lines(), vec!["ERROR short"]);
        assert_eq!(orch.stats().oversized, 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_loop() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let (mut orch, webhook) = orchestrator(&path, Vec::new(), 1024).await;
        webhook.statuses.lock().unwrap().extend([500, 500, 500]);

        append(&path, "ERROR one\nERROR two\n");
        orch.handle_event(FsEvent::modify("app.log")).await;

        // Three attempts for the first line, one for the second.
        assert_eq!(
            webhook.lines(),
            vec!["ERROR one", "ERROR one", "ERROR one", "ERROR two"]
        );
        assert_eq!(orch.stats().failed, 1);
        assert_eq!(orch.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_run_drains_events_and_terminates() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir, "");
        let events = vec![
            Err(WatcherError::Notify(notify::Error::generic("overflow"))),
            Ok(FsEvent::modify("app.log")),
        ];
        let (mut orch, webhook) = orchestrator(&path, events, 1024).await;
        append(&path, "ERROR before run\n");

        let stats = orch.run().await;
        assert_eq!(orch.state(), WatchState::Terminated);
        assert_eq!(stats.matches, 1);
        assert_eq!(webhook.lines(), vec!["ERROR before run"]);

        // Events after termination are ignored.
        append(&path, "ERROR late\n");
        orch.handle_event(FsEvent::modify("app.log")).await;
        assert_eq!(webhook.lines().len(), 1);
    }
}
