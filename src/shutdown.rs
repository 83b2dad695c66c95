//! Termination signal handling.
//!
//! One subscription to SIGINT/SIGTERM per process, held by [`Shutdown`] and
//! torn down with it. A signal cancels the shared token, which closes the
//! event source and unblocks the watch loop.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the shutdown token and the signal listener task.
#[derive(Debug, Default)]
pub struct Shutdown {
    token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to anything that must stop on shutdown.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token as if a signal had arrived.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Subscribe to termination signals. Must be called inside a runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler cannot be registered.
    pub fn listen(&mut self) -> std::io::Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let token = self.token.clone();

        #[cfg(unix)]
        let listener = {
            use tokio::signal::unix::{signal, SignalKind};

            let mut interrupt = signal(SignalKind::interrupt())?;
            let mut terminate = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                tokio::select! {
                    _ = interrupt.recv() => tracing::info!("Received SIGINT, shutting down"),
                    _ = terminate.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    () = token.cancelled() => return,
                }
                token.cancel();
            })
        };

        #[cfg(not(unix))]
        let listener = tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ctrl+C listener failed");
                        return;
                    }
                },
                () = token.cancelled() => return,
            }
            token.cancel();
        });

        self.listener = Some(listener);
        Ok(())
    }

    /// Cancel the token and wait for the listener to finish.
    pub async fn teardown(mut self) {
        self.token.cancel();
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                tracing::warn!(error = %e, "Signal listener ended abnormally");
            }
        }
    }
}
