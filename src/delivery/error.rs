//! Delivery error types.

/// Errors from a single webhook attempt.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    /// The request never produced a response.
    #[error("Webhook request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a server error.
    #[error("Webhook returned HTTP {0}")]
    Server(u16),

    /// The record could not be encoded.
    #[error("Failed to encode payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_display() {
        assert_eq!(
            DeliveryError::Server(503).to_string(),
            "Webhook returned HTTP 503"
        );
    }

    #[test]
    fn test_transport_display() {
        let err = DeliveryError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Webhook request failed: connection refused");
    }
}
