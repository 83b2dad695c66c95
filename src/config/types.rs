//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;
use crate::delivery::{Backoff, RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::watcher::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINE};

/// Raw settings as read from a config file and command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchSettings {
    /// Log file to tail.
    pub file: Option<PathBuf>,
    /// Regular expression searched in every new line.
    pub pattern: Option<String>,
    /// Endpoint receiving matches.
    pub webhook: Option<String>,
    /// Retries after the first failed delivery attempt.
    pub max_retries: u32,
    /// Minimum spacing between delivery attempts.
    pub retry_delay_ms: u64,
    pub backoff: Backoff,
    /// Pause before reopening the file after rotation.
    pub rotation_grace_ms: u64,
    /// Coalesce filesystem events within this window; 0 disables.
    pub debounce_ms: u64,
    pub read_chunk_bytes: usize,
    pub max_line_bytes: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            file: None,
            pattern: None,
            webhook: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 5000,
            backoff: Backoff::Fixed,
            rotation_grace_ms: 100,
            debounce_ms: 0,
            read_chunk_bytes: DEFAULT_CHUNK_SIZE,
            max_line_bytes: DEFAULT_MAX_LINE,
        }
    }
}

impl WatchSettings {
    /// Validate and derive the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing required field, a pattern that
    /// does not compile, a non-HTTP webhook URL, a path without a file name,
    /// or a zero buffer size.
    pub fn resolve(&self) -> Result<WatchConfig, ConfigError> {
        let target_path = self.file.clone().ok_or(ConfigError::Missing("file"))?;
        let pattern_src = self.pattern.as_deref().ok_or(ConfigError::Missing("pattern"))?;
        let webhook = self.webhook.as_deref().ok_or(ConfigError::Missing("webhook"))?;

        let file_name = target_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ConfigError::InvalidPath(target_path.clone()))?;
        let directory = match target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let pattern = Regex::new(pattern_src).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern_src.to_string(),
            source,
        })?;

        let webhook_url = Url::parse(webhook).map_err(|e| ConfigError::InvalidWebhook {
            url: webhook.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(webhook_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidWebhook {
                url: webhook.to_string(),
                reason: format!("unsupported scheme '{}'", webhook_url.scheme()),
            });
        }

        if self.read_chunk_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "read_chunk_bytes",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_line_bytes",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(WatchConfig {
            target_path,
            directory,
            file_name,
            pattern,
            webhook_url,
            retry: RetryPolicy::new(
                self.max_retries,
                Duration::from_millis(self.retry_delay_ms),
                self.backoff,
            ),
            rotation_grace: Duration::from_millis(self.rotation_grace_ms),
            debounce: (self.debounce_ms > 0).then(|| Duration::from_millis(self.debounce_ms)),
            read_chunk_bytes: self.read_chunk_bytes,
            max_line_bytes: self.max_line_bytes,
        })
    }
}

/// Validated, immutable configuration for one watch.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub target_path: PathBuf,
    /// Parent of `target_path`; `.` for a bare file name.
    pub directory: PathBuf,
    /// Base name of `target_path`, compared against event names.
    pub file_name: String,
    pub pattern: Regex,
    pub webhook_url: Url,
    pub retry: RetryPolicy,
    pub rotation_grace: Duration,
    /// `None` selects raw notification events.
    pub debounce: Option<Duration>,
    pub read_chunk_bytes: usize,
    pub max_line_bytes: usize,
}
