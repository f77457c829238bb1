// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// Bridge server: accepts peer connections on the host's Unix socket.
// Every connection gets its own transport with the full handler set, plus
// a forwarder that relays UI events as one-way notifications.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use swapperd_desktop_common::ipc;
use swapperd_desktop_common::{Bridge, Transport};
use tokio::net::UnixListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::handlers::{self, HostContext};
use crate::permissions;
use crate::ui::{BroadcastUi, UiEvent};

/// Bind the bridge socket, replacing a stale one. The socket is readable
/// by the owner only.
pub fn bind(socket_path: &Path) -> Result<UnixListener> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path).context("Failed to remove existing socket file")?;
    }

    if let Some(parent) = socket_path.parent() {
        permissions::ensure_private_directory(parent)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind to socket: {}", socket_path.display()))?;

    permissions::set_file_permissions_private(socket_path)?;

    info!("Host listening on Unix socket: {}", socket_path.display());
    Ok(listener)
}

/// Serve connections until `shutdown` resolves
pub async fn serve<F>(
    listener: UnixListener,
    ctx: Arc<HostContext>,
    ui: Arc<BroadcastUi>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down bridge server...");
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("Peer connected");
                        let bridge = attach(Transport::from_unix(stream), Arc::clone(&ctx), ui.subscribe());
                        tokio::spawn(async move {
                            bridge.closed().await;
                            debug!("Peer disconnected");
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Serve the host handlers on `transport` and relay `events` to the peer
pub fn attach(
    transport: Transport,
    ctx: Arc<HostContext>,
    events: broadcast::Receiver<UiEvent>,
) -> Bridge {
    let bridge = Bridge::new(transport);
    handlers::register(&bridge, ctx);
    tokio::spawn(forward_events(bridge.clone(), events));
    bridge
}

async fn forward_events(bridge: Bridge, mut events: broadcast::Receiver<UiEvent>) {
    loop {
        tokio::select! {
            _ = bridge.closed() => break,

            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = publish(&bridge, event) {
                        debug!("Failed to forward UI event: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Peer fell behind, {} UI events dropped", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn publish(bridge: &Bridge, event: UiEvent) -> swapperd_desktop_common::Result<()> {
    match event {
        UiEvent::ShowWindow => bridge.notify::<ipc::ShowWindow>(()),
        UiEvent::SwapRequested(swap) => bridge.notify::<ipc::SwapRequested>(swap),
        UiEvent::InstallProgress(percent) => bridge.notify::<ipc::InstallProgress>(percent),
        UiEvent::UpdateReady(version) => bridge.notify::<ipc::UpdateReady>(version),
        UiEvent::LatestVersion(version) => bridge.notify::<ipc::LatestVersion>(version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use swapperd_desktop_common::ipc::{
        ApprovalDecision, GetVersion, PendingSwap, PendingSwaps, ShowWindow, Swap, SwapDecision,
        SwapRequest, SwapRequested, SwapResponse,
    };
    use swapperd_desktop_common::{Network, QUERY_TIMEOUT};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use crate::approvals::Approvals;
    use crate::credentials::FileCredentialStore;
    use crate::handlers::tests::FakeInstaller;
    use crate::session::SessionContext;

    fn context(dir: &TempDir) -> (Arc<HostContext>, Arc<BroadcastUi>) {
        let ui = Arc::new(BroadcastUi::new(16, false));
        let ctx = Arc::new(HostContext {
            session: SessionContext::new(Network::Mainnet),
            approvals: Approvals::default(),
            credentials: Arc::new(FileCredentialStore::with_cost(dir.path().join("accounts.toml"), 4)),
            installer: Arc::new(FakeInstaller { fail: false }),
            ui: ui.clone(),
            version: "1.2.3".into(),
        });
        (ctx, ui)
    }

    #[tokio::test]
    async fn test_swap_prompt_reaches_ui_peer_and_ui_answers() {
        let dir = TempDir::new().unwrap();
        let (ctx, ui) = context(&dir);

        let (gateway_host, gateway_side) = Transport::pair();
        let (ui_host, ui_side) = Transport::pair();
        attach(gateway_host, Arc::clone(&ctx), ui.subscribe());
        attach(ui_host, Arc::clone(&ctx), ui.subscribe());

        let gateway = Bridge::new(gateway_side);
        let ui_peer = Bridge::new(ui_side);

        let (shown_tx, mut shown_rx) = mpsc::unbounded_channel();
        ui_peer.subscribe::<ShowWindow, _>(move |()| {
            let _ = shown_tx.send(());
        });
        let (tx, mut prompts) = mpsc::unbounded_channel();
        ui_peer.subscribe::<SwapRequested, _>(move |swap: PendingSwap| {
            let _ = tx.send(swap);
        });

        let request = SwapRequest {
            body: json!({"sendToken": "BTC"}),
            network: None,
            origin: None,
        };
        let call = tokio::spawn(async move { gateway.call_unbounded::<Swap>(request).await });

        shown_rx.recv().await.unwrap();
        let prompt = prompts.recv().await.unwrap();
        ui_peer
            .notify::<SwapResponse>(SwapDecision {
                approval_id: prompt.approval_id,
                decision: ApprovalDecision::Rejected,
            })
            .unwrap();

        assert_eq!(call.await.unwrap().unwrap(), ApprovalDecision::Rejected);
    }

    #[tokio::test]
    async fn test_ui_connecting_after_prompt_opened_can_answer_it() {
        let dir = TempDir::new().unwrap();
        let (ctx, ui) = context(&dir);

        let (gateway_host, gateway_side) = Transport::pair();
        attach(gateway_host, Arc::clone(&ctx), ui.subscribe());
        let gateway = Bridge::new(gateway_side);

        let request = SwapRequest {
            body: json!({"sendToken": "BTC"}),
            network: None,
            origin: Some("https://dex.example".into()),
        };
        let call = tokio::spawn(async move { gateway.call_unbounded::<Swap>(request).await });

        for _ in 0..100 {
            if ctx.approvals.pending_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ctx.approvals.pending_count(), 1);

        // Attached only now: the broadcast prompt went out before it existed
        let (ui_host, ui_side) = Transport::pair();
        attach(ui_host, Arc::clone(&ctx), ui.subscribe());
        let late_ui = Bridge::new(ui_side);

        let open = late_ui
            .call_bounded::<PendingSwaps>((), QUERY_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].request.origin.as_deref(), Some("https://dex.example"));

        let accepted = ApprovalDecision::Accepted {
            status: Some(201),
            response: Some(json!({"id": "swap-1"})),
        };
        late_ui
            .notify::<SwapResponse>(SwapDecision {
                approval_id: open[0].approval_id,
                decision: accepted.clone(),
            })
            .unwrap();

        let decision = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(decision, accepted);
        assert_eq!(ctx.approvals.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unix_socket_round_trip() {
        let dir = TempDir::new().unwrap();
        let (ctx, ui) = context(&dir);
        let socket = dir.path().join("run").join("host.sock");

        let listener = bind(&socket).unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, ctx, ui, async {
            let _ = stop_rx.await;
        }));

        let peer = Bridge::connect(&socket).await.unwrap();
        let version = peer.call_bounded::<GetVersion>((), QUERY_TIMEOUT).await.unwrap();
        assert_eq!(version, "1.2.3");

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_socket_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("host.sock");
        let _listener = bind(&socket).unwrap();

        let mode = std::fs::metadata(&socket).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
