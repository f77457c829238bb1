// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop - Host
// Privileged process serving the bridge to the gateway and UI peers

use anyhow::Result;

#[cfg(unix)]
#[tokio::main]
async fn main() -> Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use tracing::info;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    use swapperd_desktop_host::pidfile::PidFileGuard;
    use swapperd_desktop_host::{
        permissions, server, Approvals, BroadcastUi, CommandInstaller, FileCredentialStore,
        HostConfig, HostContext, SessionContext,
    };

    // Set restrictive umask before creating any files
    permissions::set_restrictive_umask();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swapperd_desktop_host=debug,swapperd_desktop_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("SwapperD Desktop host starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let _pid_guard = PidFileGuard::create()
        .context("Failed to create PID file - another host may already be running")?;

    let config = HostConfig::load()?;
    info!("Network: {}", config.network);
    info!("SwapperD home: {}", config.swapperd_home.display());
    match config.approval_timeout() {
        Some(timeout) => info!("Unanswered swap prompts are rejected after {:?}", timeout),
        None => info!("Swap prompts wait for the user indefinitely"),
    }

    let ui = Arc::new(BroadcastUi::new(config.event_buffer, config.desktop_notifications));
    let ctx = Arc::new(HostContext {
        session: SessionContext::new(config.network),
        approvals: Approvals::new(config.approval_timeout()),
        credentials: Arc::new(FileCredentialStore::in_dir(&config.swapperd_home)),
        installer: Arc::new(CommandInstaller::new(
            config.swapperd_home.clone(),
            config.install_command.clone(),
            config.update_command.clone(),
        )),
        ui: ui.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let listener = server::bind(&config.socket_path)?;
    info!("Host started successfully");

    server::serve(listener, ctx, ui, wait_for_shutdown()).await?;

    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    info!("Host shut down");
    Ok(())
}

#[cfg(not(unix))]
fn main() -> Result<()> {
    anyhow::bail!("The SwapperD Desktop host requires Unix domain sockets")
}

/// Wait for Ctrl+C or SIGTERM
#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{info, warn};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down");
        }
    }
}
