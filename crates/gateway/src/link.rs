// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// Host link: the gateway's connection to the host's bridge socket.
// A supervisor task reconnects with exponential backoff; while the link is
// down, callers get `Error::Closed` and degrade.

use swapperd_desktop_common::{Bridge, Error, Result};
use tokio::sync::watch;
use tokio::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HostLink {
    current: watch::Receiver<Option<Bridge>>,
}

impl HostLink {
    /// A link that always uses `bridge`
    pub fn fixed(bridge: Bridge) -> Self {
        let (_tx, current) = watch::channel(Some(bridge));
        Self { current }
    }

    /// A link that never connects
    pub fn disconnected() -> Self {
        let (_tx, current) = watch::channel(None);
        Self { current }
    }

    /// Keep a connection to the host socket at `path` alive
    #[cfg(unix)]
    pub fn reconnecting(path: std::path::PathBuf) -> Self {
        let (tx, current) = watch::channel(None);
        tokio::spawn(supervise(path, tx));
        Self { current }
    }

    /// The live bridge, or `Error::Closed` while disconnected
    pub fn bridge(&self) -> Result<Bridge> {
        self.current
            .borrow()
            .as_ref()
            .filter(|bridge| !bridge.is_closed())
            .cloned()
            .ok_or(Error::Closed)
    }

    pub fn is_connected(&self) -> bool {
        self.bridge().is_ok()
    }
}

#[cfg(unix)]
async fn supervise(path: std::path::PathBuf, tx: watch::Sender<Option<Bridge>>) {
    use tracing::{debug, info, warn};

    let mut backoff = INITIAL_BACKOFF;

    loop {
        match Bridge::connect(&path).await {
            Ok(bridge) => {
                info!("Connected to host at {}", path.display());
                backoff = INITIAL_BACKOFF;
                tx.send_replace(Some(bridge.clone()));
                bridge.closed().await;
                tx.send_replace(None);
                warn!("Lost connection to host, reconnecting");
            }
            Err(e) => {
                debug!("Host not reachable at {}: {}", path.display(), e);
            }
        }

        // Every link handle is gone
        if tx.is_closed() {
            break;
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
