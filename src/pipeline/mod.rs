//! Pipeline module: wires the watcher parts and delivery into one loop.

mod runner;
mod state;

pub use runner::Orchestrator;
pub use state::{WatchState, WatchStateMachine, WatchStats};

use tokio_util::sync::CancellationToken;

use crate::config::WatchConfig;
use crate::delivery::DeliveryClient;
use crate::watcher::{local_hostname, LineAssembler, Matcher, NotifySource, TailCursor};
use crate::Error;

/// Open the directory watch and the target file, ready to run.
///
/// Cancelling `shutdown` closes the event source and ends
/// [`Orchestrator::run`].
///
/// # Errors
///
/// Returns an error if the directory cannot be watched, the file cannot be
/// opened, or the HTTP client cannot be built.
pub async fn start(
    config: &WatchConfig,
    shutdown: &CancellationToken,
) -> Result<Orchestrator<NotifySource>, Error> {
    let source = match config.debounce {
        Some(timeout) => NotifySource::open_debounced(&config.directory, timeout, shutdown.clone())?,
        None => NotifySource::open(&config.directory, shutdown.clone())?,
    };

    let cursor = TailCursor::open(&config.target_path)
        .await?
        .with_chunk_size(config.read_chunk_bytes)
        .with_rotation_grace(config.rotation_grace);

    let matcher = Matcher::new(config.pattern.clone(), local_hostname());
    let delivery = DeliveryClient::http(config.webhook_url.clone(), config.retry)?;

    tracing::debug!(
        directory = %config.directory.display(),
        file = %config.file_name,
        hostname = %matcher.hostname(),
        "Watch ready"
    );
    Ok(Orchestrator::new(
        source,
        cursor,
        LineAssembler::new(config.max_line_bytes),
        matcher,
        delivery,
        config.file_name.clone(),
    ))
}
