//! Webhook delivery with bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use url::Url;

use super::error::DeliveryError;
use super::policy::{is_retryable_status, RetryPolicy};
use crate::watcher::MatchRecord;

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A single POST to the webhook endpoint.
#[async_trait]
pub trait Webhook: Send + Sync {
    /// Send a JSON body and return the response status.
    async fn post(&self, body: &[u8]) -> Result<u16, DeliveryError>;
}

/// [`Webhook`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpWebhook {
    client: Client,
    url: Url,
}

impl HttpWebhook {
    /// Build a client with connect and request timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Client`] if the TLS backend cannot be set up.
    pub fn new(url: Url) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;
        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Webhook for HttpWebhook {
    async fn post(&self, body: &[u8]) -> Result<u16, DeliveryError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Final result of delivering one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint accepted the record.
    Delivered { attempts: u32, status: u16 },
    /// The endpoint answered with a non-retryable client error.
    Rejected { attempts: u32, status: u16 },
    /// Every allowed attempt failed.
    Exhausted { attempts: u32 },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match *self {
            Self::Delivered { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::Exhausted { attempts } => attempts,
        }
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Posts match records, retrying transient failures per [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct DeliveryClient<W = HttpWebhook> {
    webhook: W,
    policy: RetryPolicy,
}

impl DeliveryClient<HttpWebhook> {
    /// Client posting to `url` over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Client`] if the HTTP client cannot be built.
    pub fn http(url: Url, policy: RetryPolicy) -> Result<Self, DeliveryError> {
        Ok(Self::new(HttpWebhook::new(url)?, policy))
    }
}

impl<W: Webhook> DeliveryClient<W> {
    #[must_use]
    pub fn new(webhook: W, policy: RetryPolicy) -> Self {
        Self { webhook, policy }
    }

    /// Deliver `record`, retrying network errors and 5xx responses.
    ///
    /// Failures are logged here and never returned; the outcome reports
    /// what happened.
    pub async fn deliver(&self, record: MatchRecord) -> DeliveryOutcome {
        let body = match serde_json::to_vec(&record) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %DeliveryError::from(e), "Dropping match record");
                return DeliveryOutcome::Exhausted { attempts: 0 };
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let failure = match self.webhook.post(&body).await {
                Ok(status) if !is_retryable_status(status) => {
                    return self.finish(&record, attempts, status);
                }
                Ok(status) => DeliveryError::Server(status),
                Err(e) => e,
            };

            if !self.policy.should_retry(attempts) {
                tracing::error!(
                    attempts,
                    error = %failure,
                    line = %record.line,
                    "Webhook delivery failed, giving up"
                );
                return DeliveryOutcome::Exhausted { attempts };
            }

            let delay = self.policy.delay_before(attempts);
            tracing::warn!(
                attempt = attempts,
                error = %failure,
                delay_ms = delay.as_millis(),
                "Webhook delivery failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn finish(&self, record: &MatchRecord, attempts: u32, status: u16) -> DeliveryOutcome {
        if status < 400 {
            tracing::debug!(attempts, status, "Match delivered");
            DeliveryOutcome::Delivered { attempts, status }
        } else {
            tracing::warn!(
                attempts,
                status,
                line = %record.line,
                "Webhook rejected match, not retrying"
            );
            DeliveryOutcome::Rejected { attempts, status }
        }
    }
}
