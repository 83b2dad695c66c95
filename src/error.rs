//! Setup errors surfaced to the process boundary.

use crate::config::ConfigError;
use crate::delivery::DeliveryError;
use crate::watcher::WatcherError;

/// Anything that prevents the watch loop from starting.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
