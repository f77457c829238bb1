// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// Session context: selected network and the unlocked password.
// Lives only in the host's memory and is never written to disk.

use swapperd_desktop_common::Network;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

struct SessionState {
    network: Network,
    password: Option<Zeroizing<String>>,
}

pub struct SessionContext {
    state: RwLock<SessionState>,
}

impl SessionContext {
    pub fn new(network: Network) -> Self {
        Self {
            state: RwLock::new(SessionState {
                network,
                password: None,
            }),
        }
    }

    pub async fn network(&self) -> Network {
        self.state.read().await.network
    }

    pub async fn set_network(&self, network: Network) {
        self.state.write().await.network = network;
    }

    /// The unlocked password, `None` while locked
    pub async fn password(&self) -> Option<Zeroizing<String>> {
        self.state.read().await.password.clone()
    }

    pub async fn is_unlocked(&self) -> bool {
        self.state.read().await.password.is_some()
    }

    pub async fn unlock(&self, password: String) {
        self.state.write().await.password = Some(Zeroizing::new(password));
    }

    /// Forget the password. Completes under the write lock, so any query
    /// issued after this returns sees the locked state.
    pub async fn lock(&self) {
        self.state.write().await.password = None;
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_locked_on_configured_network() {
        let session = SessionContext::new(Network::Testnet);
        assert_eq!(session.network().await, Network::Testnet);
        assert!(session.password().await.is_none());
        assert!(!session.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_lock_is_visible_to_next_query() {
        let session = SessionContext::default();
        session.unlock("hunter2".into()).await;
        assert_eq!(session.password().await.as_deref().map(String::as_str), Some("hunter2"));

        session.lock().await;
        assert!(session.password().await.is_none());
    }

    #[tokio::test]
    async fn test_network_switch_keeps_password() {
        let session = SessionContext::default();
        session.unlock("hunter2".into()).await;
        session.set_network(Network::Testnet).await;

        assert_eq!(session.network().await, Network::Testnet);
        assert!(session.is_unlocked().await);
    }
}
