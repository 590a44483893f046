//! Graceful Shutdown Module
//!
//! Signal handling for the HTTP server and the final client disposal.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use crate::client::SigningClient;

/// Waits for SIGTERM or SIGINT.
///
/// A handler that cannot be installed is logged and never fires.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Waits for `server` to drain, bounded by `timeout`, then disposes the
/// client.
pub async fn drain_and_dispose<F, E>(server: F, client: &SigningClient, timeout: Duration)
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, server).await {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => error!(error = %e, "HTTP server error"),
        Err(_) => warn!(
            timeout_secs = timeout.as_secs(),
            "Shutdown timeout reached, dropping in-flight requests"
        ),
    }

    client.dispose().await;
    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelFactory, GatewayChannel, GatewayTransport};
    use crate::error::SigningError;
    use crate::gateway::{GatewayError, SignResponse, SubmitPayload};
    use crate::retry::RetryExecutor;
    use async_trait::async_trait;
    use std::sync::Arc;
    use url::Url;

    struct IdleTransport;

    #[async_trait]
    impl GatewayTransport for IdleTransport {
        async fn submit(&self, _: &SubmitPayload) -> Result<String, GatewayError> {
            Err(GatewayError::rejected("idle"))
        }
        async fn query_status(&self, _: &str, _: &str) -> Result<SignResponse, GatewayError> {
            Err(GatewayError::rejected("idle"))
        }
        async fn close(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        fn abort(&self) {}
    }

    struct IdleFactory;

    impl ChannelFactory for IdleFactory {
        fn create(&self) -> Result<GatewayChannel, SigningError> {
            Ok(GatewayChannel::new(1, "https://gw", Box::new(IdleTransport)))
        }
    }

    fn client() -> SigningClient {
        SigningClient::with_factory(
            Arc::new(IdleFactory),
            RetryExecutor::default(),
            Url::parse("https://gw").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_drain_disposes_client() {
        let client = client();
        drain_and_dispose(async { Ok::<(), std::io::Error>(()) }, &client, Duration::from_secs(1))
            .await;
        assert!(client.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_still_disposes() {
        let client = client();
        let stuck = std::future::pending::<Result<(), std::io::Error>>();
        drain_and_dispose(stuck, &client, Duration::from_secs(30)).await;
        assert!(client.is_disposed());
    }
}
