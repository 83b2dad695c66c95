//! Webhook delivery of matched lines.

mod client;
mod error;
mod policy;

pub use client::{DeliveryClient, DeliveryOutcome, HttpWebhook, Webhook};
pub use error::DeliveryError;
pub use policy::{
    is_retryable_status, Backoff, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
