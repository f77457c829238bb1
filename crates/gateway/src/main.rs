// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop - Gateway
// Serves the localhost HTTP API on 127.0.0.1:7928

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swapperd_desktop_gateway::{create_router, AppState, GatewayConfig, HostLink};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swapperd_desktop_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("SwapperD Desktop gateway starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::load()?;
    info!("Host socket: {}", config.host_socket.display());
    info!("SwapperD mainnet: {}", config.daemons.mainnet);
    info!("SwapperD testnet: {}", config.daemons.testnet);

    let link = connect_host(&config);

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let state = Arc::new(AppState {
        link,
        http,
        daemons: config.daemons.clone(),
        query_timeout: config.query_timeout(),
        proxy_timeout: config.proxy_timeout(),
    });
    let app = create_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("Gateway listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    info!("Gateway shut down");
    Ok(())
}

#[cfg(unix)]
fn connect_host(config: &GatewayConfig) -> HostLink {
    HostLink::reconnecting(config.host_socket.clone())
}

#[cfg(not(unix))]
fn connect_host(_config: &GatewayConfig) -> HostLink {
    tracing::warn!("Host bridge needs Unix domain sockets; proxy and swap routes are unavailable");
    HostLink::disconnected()
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C, shutting down");
}
