//! Shutdown coordination for the gateway.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps the process-wide lifecycle token. Listeners, the upstream
/// connector and every request context hang off it, so triggering it
/// stops accepting, ends open streams and cancels outstanding calls.
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A child token, cancelled together with this coordinator.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// The lifecycle token itself.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let child = shutdown.subscribe();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        assert!(!shutdown.is_triggered());
        shutdown.trigger();

        handle.await.unwrap();
        assert!(child.is_cancelled());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn child_cancellation_does_not_propagate_up() {
        let shutdown = Shutdown::new();
        shutdown.subscribe().cancel();
        assert!(!shutdown.is_triggered());
    }
}
