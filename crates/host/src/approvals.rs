// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! Registry of swap approvals waiting on the user.
//!
//! The Swap handler opens a [`PendingApproval`] and awaits it; a UI peer
//! settles it through [`Approvals::decide`] when it sends a `swap_response`.
//! Dropping the pending approval (the caller cancelled, or the peer went
//! away) removes it from the registry, so nothing lingers after a prompt is
//! abandoned.
//!
//! Open prompts stay listed until settled so a UI peer that connects late
//! can still answer them (see [`Approvals::pending_swaps`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swapperd_desktop_common::ipc::{ApprovalDecision, PendingSwap, SwapRequest};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

struct OpenPrompt {
    seq: u64,
    swap: PendingSwap,
    reply: oneshot::Sender<ApprovalDecision>,
}

type PendingMap = HashMap<Uuid, OpenPrompt>;

#[derive(Clone, Default)]
pub struct Approvals {
    pending: Arc<Mutex<PendingMap>>,
    next_seq: Arc<AtomicU64>,
    timeout: Option<Duration>,
}

impl Approvals {
    /// `timeout` rejects prompts nobody answered in time; `None` waits for
    /// the UI indefinitely
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            pending: Arc::default(),
            next_seq: Arc::default(),
            timeout,
        }
    }

    pub fn open(&self, request: SwapRequest) -> PendingApproval {
        let (reply, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let swap = PendingSwap {
            approval_id: id,
            request,
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            OpenPrompt {
                seq,
                swap: swap.clone(),
                reply,
            },
        );
        debug!("Opened approval {}", id);
        PendingApproval {
            swap,
            rx,
            timeout: self.timeout,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Settle an approval. Returns false when the id is unknown, e.g. the
    /// prompt was already answered or abandoned.
    pub fn decide(&self, id: Uuid, decision: ApprovalDecision) -> bool {
        let Some(prompt) = self.lock().remove(&id) else {
            return false;
        };
        prompt.reply.send(decision).is_ok()
    }

    /// Prompts still waiting for a decision, oldest first
    pub fn pending_swaps(&self) -> Vec<PendingSwap> {
        let pending = self.lock();
        let mut open: Vec<_> = pending.values().collect();
        open.sort_by_key(|prompt| prompt.seq);
        open.into_iter().map(|prompt| prompt.swap.clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct PendingApproval {
    swap: PendingSwap,
    rx: oneshot::Receiver<ApprovalDecision>,
    timeout: Option<Duration>,
    pending: Arc<Mutex<PendingMap>>,
}

impl PendingApproval {
    pub fn id(&self) -> Uuid {
        self.swap.approval_id
    }

    /// The prompt shown to the user
    pub fn swap(&self) -> &PendingSwap {
        &self.swap
    }

    /// Wait for the user's decision
    pub async fn decision(mut self) -> ApprovalDecision {
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("Approval {} abandoned after {:?}, rejecting", self.id(), limit);
                    return ApprovalDecision::Rejected;
                }
            },
            None => (&mut self.rx).await,
        };
        outcome.unwrap_or(ApprovalDecision::Rejected)
    }
}

impl Drop for PendingApproval {
    fn drop(&mut self) {
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.swap.approval_id)
            .is_some();
        if removed {
            debug!("Approval {} dropped before a decision", self.swap.approval_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(token: &str) -> SwapRequest {
        SwapRequest {
            body: json!({"sendToken": token}),
            network: None,
            origin: None,
        }
    }

    #[tokio::test]
    async fn test_decide_resolves_waiter() {
        let approvals = Approvals::default();
        let pending = approvals.open(request("BTC"));
        let id = pending.id();
        assert_eq!(approvals.pending_count(), 1);

        let waiter = tokio::spawn(pending.decision());
        let accepted = ApprovalDecision::Accepted {
            status: Some(201),
            response: Some(json!({"id": "swap-1"})),
        };
        assert!(approvals.decide(id, accepted.clone()));

        assert_eq!(waiter.await.unwrap(), accepted);
        assert_eq!(approvals.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_second_decision_is_ignored() {
        let approvals = Approvals::default();
        let pending = approvals.open(request("BTC"));
        let id = pending.id();

        assert!(approvals.decide(id, ApprovalDecision::Rejected));
        assert!(!approvals.decide(id, ApprovalDecision::Rejected));
        assert_eq!(pending.decision().await, ApprovalDecision::Rejected);
    }

    #[tokio::test]
    async fn test_dropped_approval_leaves_no_state() {
        let approvals = Approvals::default();
        let pending = approvals.open(request("BTC"));
        let id = pending.id();

        drop(pending);
        assert_eq!(approvals.pending_count(), 0);
        assert!(!approvals.decide(id, ApprovalDecision::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_approval_is_rejected_after_timeout() {
        let approvals = Approvals::new(Some(Duration::from_secs(60)));
        let pending = approvals.open(request("BTC"));

        assert_eq!(pending.decision().await, ApprovalDecision::Rejected);
        assert_eq!(approvals.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_open_prompts_are_listed_until_settled() {
        let approvals = Approvals::default();
        let first = approvals.open(request("BTC"));
        let second = approvals.open(request("ETH"));

        let listed = approvals.pending_swaps();
        assert_eq!(listed, vec![first.swap().clone(), second.swap().clone()]);
        assert_eq!(listed[1].request.body["sendToken"], "ETH");

        assert!(approvals.decide(first.id(), ApprovalDecision::Rejected));
        drop(second);
        assert!(approvals.pending_swaps().is_empty());
    }

    #[test]
    fn test_unknown_id_is_not_decided() {
        let approvals = Approvals::default();
        assert!(!approvals.decide(Uuid::new_v4(), ApprovalDecision::Rejected));
    }
}
