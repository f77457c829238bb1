// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! Bridge handlers served by the host on every peer connection.

use std::sync::Arc;

use anyhow::Context;
use swapperd_desktop_common::ipc::{
    ApprovalDecision, CheckSetup, CreateAccount, CreateAccountRequest, GetNetwork, GetPassword,
    GetVersion, Lock, Notify, NotifyRequest, PendingSwaps, SetNetwork, Swap, SwapDecision,
    SwapRequest, SwapResponse, UpdateSwapperD, UpdateSwapperDRequest, VerifyPassword,
    VerifyPasswordRequest,
};
use swapperd_desktop_common::{Bridge, Network};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::approvals::Approvals;
use crate::credentials::{CredentialStore, DEFAULT_ACCOUNT};
use crate::installer::Installer;
use crate::session::SessionContext;
use crate::ui::{UiSurface, APP_NAME};

/// State shared by every connection's handlers
pub struct HostContext {
    pub session: SessionContext,
    pub approvals: Approvals,
    pub credentials: Arc<dyn CredentialStore>,
    pub installer: Arc<dyn Installer>,
    pub ui: Arc<dyn UiSurface>,
    pub version: String,
}

impl HostContext {
    async fn check_setup(&self) -> anyhow::Result<bool> {
        self.credentials.exists(DEFAULT_ACCOUNT)
    }

    /// Run a credential store operation off the async workers
    async fn with_credentials<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CredentialStore) -> anyhow::Result<T> + Send + 'static,
    {
        let credentials = Arc::clone(&self.credentials);
        tokio::task::spawn_blocking(move || op(credentials.as_ref())).await?
    }

    async fn create_account(&self, req: CreateAccountRequest) -> anyhow::Result<String> {
        self.ui.install_progress(Some(0));
        let installed = self.installer.install(req.mnemonic).await;
        self.ui.install_progress(None);
        let mnemonic = installed.context("Failed to install SwapperD")?;

        let password = Zeroizing::new(req.password.clone());
        self.with_credentials(move |store| store.create(DEFAULT_ACCOUNT, &password))
            .await?;
        self.session.unlock(req.password).await;
        info!("Account created");
        Ok(mnemonic)
    }

    async fn verify_password(&self, req: VerifyPasswordRequest) -> anyhow::Result<bool> {
        let password = Zeroizing::new(req.password.clone());
        let verified = self
            .with_credentials(move |store| store.verify(DEFAULT_ACCOUNT, &password))
            .await
            .context("Failed to verify password")?;
        if verified {
            self.session.unlock(req.password).await;
            info!("Wallet unlocked");
        } else {
            debug!("Password mismatch");
        }
        Ok(verified)
    }

    async fn notify(&self, req: NotifyRequest) -> anyhow::Result<()> {
        let title = req.title.as_deref().unwrap_or(APP_NAME);
        self.ui.notify(title, &req.body);
        Ok(())
    }

    /// Bring the UI forward and wait for the user. Returns only once the
    /// prompt is settled; if the caller cancels, the task is aborted and the
    /// pending approval is discarded.
    async fn swap(&self, request: SwapRequest) -> anyhow::Result<ApprovalDecision> {
        self.ui.bring_to_foreground();

        let pending = self.approvals.open(request);
        let approval_id = pending.id();
        info!(
            "Swap {} awaiting approval (origin: {})",
            approval_id,
            pending.swap().request.origin.as_deref().unwrap_or("unknown")
        );
        self.ui.show_swap(pending.swap().clone());

        let decision = pending.decision().await;
        info!(
            "Swap {} {}",
            approval_id,
            if decision.is_accepted() { "accepted" } else { "rejected" }
        );
        Ok(decision)
    }

    async fn update_swapperd(&self, req: UpdateSwapperDRequest) -> anyhow::Result<()> {
        if req.swapperd {
            self.ui.install_progress(Some(0));
            let installed = self.installer.install(None).await;
            self.ui.install_progress(None);
            installed.context("Failed to update SwapperD")?;
        } else if req.restart {
            self.installer.restart_and_update().await?;
        }
        Ok(())
    }

    fn swap_response(&self, response: SwapDecision) {
        if !self.approvals.decide(response.approval_id, response.decision) {
            warn!("No pending swap {}, response ignored", response.approval_id);
        }
    }
}

/// Register every host handler and listener on `bridge`
pub fn register(bridge: &Bridge, ctx: Arc<HostContext>) {
    let c = Arc::clone(&ctx);
    bridge.handle::<CheckSetup, _, _>(move |()| {
        let c = Arc::clone(&c);
        async move { c.check_setup().await }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<CreateAccount, _, _>(move |req| {
        let c = Arc::clone(&c);
        async move { c.create_account(req).await }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<VerifyPassword, _, _>(move |req| {
        let c = Arc::clone(&c);
        async move { c.verify_password(req).await }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<GetPassword, _, _>(move |()| {
        let c = Arc::clone(&c);
        async move { Ok(c.session.password().await.map(|p| p.to_string())) }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<GetNetwork, _, _>(move |()| {
        let c = Arc::clone(&c);
        async move { Ok(c.session.network().await) }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<SetNetwork, _, _>(move |network: Network| {
        let c = Arc::clone(&c);
        async move {
            c.session.set_network(network).await;
            info!("Network set to {}", network);
            Ok(())
        }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<Lock, _, _>(move |()| {
        let c = Arc::clone(&c);
        async move {
            c.session.lock().await;
            info!("Wallet locked");
            Ok(())
        }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<GetVersion, _, _>(move |()| {
        let c = Arc::clone(&c);
        async move { Ok(c.version.clone()) }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<Notify, _, _>(move |req| {
        let c = Arc::clone(&c);
        async move { c.notify(req).await }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<Swap, _, _>(move |req| {
        let c = Arc::clone(&c);
        async move { c.swap(req).await }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<PendingSwaps, _, _>(move |()| {
        let c = Arc::clone(&c);
        async move { Ok(c.approvals.pending_swaps()) }
    });

    let c = Arc::clone(&ctx);
    bridge.handle::<UpdateSwapperD, _, _>(move |req| {
        let c = Arc::clone(&c);
        async move { c.update_swapperd(req).await }
    });

    bridge.subscribe::<SwapResponse, _>(move |response| ctx.swap_response(response));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use swapperd_desktop_common::ipc::{PendingSwap, SwapRequested};
    use swapperd_desktop_common::{Error, Transport, QUERY_TIMEOUT};
    use tokio::sync::mpsc;

    use crate::credentials::FileCredentialStore;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum UiCall {
        Foreground,
        ShowSwap(PendingSwap),
        Notify(String, String),
        Progress(Option<u8>),
    }

    /// Records every call and forwards swap prompts to the test
    pub(crate) struct RecordingUi {
        pub calls: Mutex<Vec<UiCall>>,
        pub swaps: mpsc::UnboundedSender<PendingSwap>,
    }

    impl UiSurface for RecordingUi {
        fn bring_to_foreground(&self) {
            self.calls.lock().unwrap().push(UiCall::Foreground);
        }

        fn show_swap(&self, swap: PendingSwap) {
            self.calls.lock().unwrap().push(UiCall::ShowSwap(swap.clone()));
            let _ = self.swaps.send(swap);
        }

        fn notify(&self, title: &str, body: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(UiCall::Notify(title.into(), body.into()));
        }

        fn install_progress(&self, percent: Option<u8>) {
            self.calls.lock().unwrap().push(UiCall::Progress(percent));
        }
    }

    pub(crate) struct FakeInstaller {
        pub fail: bool,
    }

    #[async_trait]
    impl Installer for FakeInstaller {
        async fn install(&self, mnemonic: Option<String>) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("installer crashed");
            }
            Ok(mnemonic.unwrap_or_else(|| "generated words".into()))
        }

        async fn restart_and_update(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    pub(crate) struct Harness {
        pub ctx: Arc<HostContext>,
        pub ui: Arc<RecordingUi>,
        pub swaps: mpsc::UnboundedReceiver<PendingSwap>,
        pub peer: Bridge,
        _dir: tempfile::TempDir,
    }

    pub(crate) fn harness_with(installer_fails: bool) -> Harness {
        let dir = tempfile::TempDir::new().unwrap();
        let (tx, swaps) = mpsc::unbounded_channel();
        let ui = Arc::new(RecordingUi {
            calls: Mutex::new(Vec::new()),
            swaps: tx,
        });
        let ctx = Arc::new(HostContext {
            session: SessionContext::new(Network::Mainnet),
            approvals: Approvals::default(),
            credentials: Arc::new(FileCredentialStore::with_cost(dir.path().join("accounts.toml"), 4)),
            installer: Arc::new(FakeInstaller { fail: installer_fails }),
            ui: ui.clone(),
            version: "1.2.3".into(),
        });

        let (host_side, peer_side) = Transport::pair();
        register(&Bridge::new(host_side), Arc::clone(&ctx));

        Harness {
            ctx,
            ui,
            swaps,
            peer: Bridge::new(peer_side),
            _dir: dir,
        }
    }

    pub(crate) fn harness() -> Harness {
        harness_with(false)
    }

    fn swap_request() -> SwapRequest {
        SwapRequest {
            body: json!({"sendToken": "BTC", "receiveToken": "ETH", "sendAmount": "10000"}),
            network: Some(Network::Testnet),
            origin: Some("https://dex.example".into()),
        }
    }

    #[tokio::test]
    async fn test_create_account_then_verify() {
        let h = harness();
        assert!(!h.peer.call_bounded::<CheckSetup>((), QUERY_TIMEOUT).await.unwrap());

        let mnemonic = h
            .peer
            .call_unbounded::<CreateAccount>(CreateAccountRequest {
                mnemonic: Some("restored words".into()),
                password: "correct horse".into(),
            })
            .await
            .unwrap();
        assert_eq!(mnemonic, "restored words");
        assert!(h.peer.call_bounded::<CheckSetup>((), QUERY_TIMEOUT).await.unwrap());
        assert_eq!(
            h.peer.call_bounded::<GetPassword>((), QUERY_TIMEOUT).await.unwrap(),
            Some("correct horse".into())
        );

        let calls = h.ui.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![UiCall::Progress(Some(0)), UiCall::Progress(None)]);
    }

    #[tokio::test]
    async fn test_failed_install_creates_no_account() {
        let h = harness_with(true);
        let err = h
            .peer
            .call_unbounded::<CreateAccount>(CreateAccountRequest {
                mnemonic: None,
                password: "pw".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Handler(m) if m.contains("installer crashed")));
        assert!(!h.ctx.credentials.exists(DEFAULT_ACCOUNT).unwrap());
        assert!(!h.ctx.session.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_verify_unlocks_only_on_match() {
        let h = harness();
        h.ctx.credentials.create(DEFAULT_ACCOUNT, "correct horse").unwrap();

        let wrong = h
            .peer
            .call_bounded::<VerifyPassword>(VerifyPasswordRequest { password: "nope".into() }, QUERY_TIMEOUT)
            .await
            .unwrap();
        assert!(!wrong);
        assert_eq!(h.peer.call_bounded::<GetPassword>((), QUERY_TIMEOUT).await.unwrap(), None);

        let right = h
            .peer
            .call_bounded::<VerifyPassword>(
                VerifyPasswordRequest { password: "correct horse".into() },
                QUERY_TIMEOUT,
            )
            .await
            .unwrap();
        assert!(right);
        assert!(h.ctx.session.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_verify_without_account_is_handler_error() {
        let h = harness();
        let err = h
            .peer
            .call_bounded::<VerifyPassword>(VerifyPasswordRequest { password: "pw".into() }, QUERY_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handler(m) if m.contains("Failed to verify password")));
    }

    #[tokio::test]
    async fn test_lock_then_get_password_is_none() {
        let h = harness();
        h.ctx.session.unlock("hunter2".into()).await;

        h.peer.call_bounded::<Lock>((), QUERY_TIMEOUT).await.unwrap();
        assert_eq!(h.peer.call_bounded::<GetPassword>((), QUERY_TIMEOUT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_network_and_version() {
        let h = harness();
        h.peer
            .call_bounded::<SetNetwork>(Network::Testnet, QUERY_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(
            h.peer.call_bounded::<GetNetwork>((), QUERY_TIMEOUT).await.unwrap(),
            Network::Testnet
        );
        assert_eq!(h.peer.call_bounded::<GetVersion>((), QUERY_TIMEOUT).await.unwrap(), "1.2.3");
    }

    #[tokio::test]
    async fn test_notify_uses_default_title() {
        let h = harness();
        h.peer
            .call_bounded::<Notify>(NotifyRequest { title: None, body: "Swap complete".into() }, QUERY_TIMEOUT)
            .await
            .unwrap();

        let calls = h.ui.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![UiCall::Notify(APP_NAME.into(), "Swap complete".into())]);
    }

    #[tokio::test]
    async fn test_swap_foregrounds_then_waits_for_response() {
        let mut h = harness();
        let peer = h.peer.clone();
        let call = tokio::spawn(async move { peer.call_unbounded::<Swap>(swap_request()).await });

        let prompt = h.swaps.recv().await.unwrap();
        assert_eq!(prompt.request, swap_request());
        {
            let calls = h.ui.calls.lock().unwrap();
            assert_eq!(calls[0], UiCall::Foreground);
            assert_eq!(calls[1], UiCall::ShowSwap(prompt.clone()));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!call.is_finished());

        let decision = ApprovalDecision::Accepted {
            status: Some(201),
            response: Some(json!({"id": "swap-1"})),
        };
        h.peer
            .notify::<SwapResponse>(SwapDecision {
                approval_id: prompt.approval_id,
                decision: decision.clone(),
            })
            .unwrap();

        assert_eq!(call.await.unwrap().unwrap(), decision);
        assert_eq!(h.ctx.approvals.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_swap_leaves_no_pending_approval() {
        let mut h = harness();
        let peer = h.peer.clone();
        let call = tokio::spawn(async move { peer.call_unbounded::<Swap>(swap_request()).await });

        h.swaps.recv().await.unwrap();
        assert_eq!(h.ctx.approvals.pending_count(), 1);

        call.abort();
        for _ in 0..100 {
            if h.ctx.approvals.pending_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.ctx.approvals.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_swaps_lists_open_prompts() {
        let mut h = harness();
        assert!(h
            .peer
            .call_bounded::<PendingSwaps>((), QUERY_TIMEOUT)
            .await
            .unwrap()
            .is_empty());

        let peer = h.peer.clone();
        let call = tokio::spawn(async move { peer.call_unbounded::<Swap>(swap_request()).await });
        let prompt = h.swaps.recv().await.unwrap();

        let listed = h.peer.call_bounded::<PendingSwaps>((), QUERY_TIMEOUT).await.unwrap();
        assert_eq!(listed, vec![prompt.clone()]);

        h.peer
            .notify::<SwapResponse>(SwapDecision {
                approval_id: prompt.approval_id,
                decision: ApprovalDecision::Rejected,
            })
            .unwrap();
        assert_eq!(call.await.unwrap().unwrap(), ApprovalDecision::Rejected);
        assert!(h
            .peer
            .call_bounded::<PendingSwaps>((), QUERY_TIMEOUT)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_swapperd_reports_progress() {
        let h = harness();
        h.peer
            .call_unbounded::<UpdateSwapperD>(UpdateSwapperDRequest { swapperd: true, restart: false })
            .await
            .unwrap();

        let calls = h.ui.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![UiCall::Progress(Some(0)), UiCall::Progress(None)]);
    }

    #[tokio::test]
    async fn test_unused_notification_kinds_are_ignored_by_host() {
        let h = harness();
        // Host-to-UI kinds sent the wrong way have no listener on the host
        h.peer
            .notify::<SwapRequested>(PendingSwap {
                approval_id: uuid::Uuid::new_v4(),
                request: swap_request(),
            })
            .unwrap();
        assert!(h.peer.call_bounded::<GetVersion>((), QUERY_TIMEOUT).await.is_ok());
    }
}
