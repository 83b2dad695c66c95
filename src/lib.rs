//! Tailhook - tail a log file and forward pattern matches to a webhook.

pub mod config;
pub mod delivery;
mod error;
pub mod pipeline;
pub mod shutdown;
pub mod watcher;

pub use error::Error;
