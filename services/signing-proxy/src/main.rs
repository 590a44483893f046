//! Signing Proxy - Main Entry Point
//!
//! Serves the signing HTTP API until SIGINT/SIGTERM, then drains requests and
//! disposes the gateway client.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rust_common::{TracingConfig, init_tracing};
use tracing::info;

use signing_proxy::api::{self, AppState};
use signing_proxy::shutdown::{drain_and_dispose, wait_for_signal};
use signing_proxy::{Config, SigningClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let tracing_config = TracingConfig::default()
        .with_service_name("signing-proxy")
        .with_log_level(&config.log_level)
        .with_json_output(config.log_json);
    init_tracing(&tracing_config).context("failed to initialize tracing")?;

    info!(
        gateway = %config.gateway_url,
        insecure_skip_verify = config.insecure_skip_verify,
        "Starting Signing Proxy"
    );

    let client = Arc::new(
        SigningClient::connect(&config).context("failed to initialize signing client")?,
    );

    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen_addr()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let state = AppState::new(
        Arc::clone(&client),
        config.default_language.as_str(),
        config.max_request_bytes,
    );
    let app = api::router(state);

    info!("Signing Proxy listening on {}", addr);

    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = signal_rx.await;
            })
            .await
    });

    wait_for_signal().await;
    let _ = signal_tx.send(());

    let server = async {
        match server.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    };
    drain_and_dispose(server, &client, config.shutdown_timeout()).await;

    info!("Signing Proxy stopped");
    Ok(())
}
