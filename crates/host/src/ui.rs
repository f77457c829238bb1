// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// UI surface: everything the host asks of the desktop shell and UI peers

use swapperd_desktop_common::ipc::PendingSwap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const APP_NAME: &str = "SwapperD Desktop";

/// Events fanned out to every connected UI peer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ShowWindow,
    SwapRequested(PendingSwap),
    InstallProgress(Option<u8>),
    UpdateReady(String),
    LatestVersion(String),
}

pub trait UiSurface: Send + Sync {
    fn bring_to_foreground(&self);

    /// Present a swap for approval
    fn show_swap(&self, swap: PendingSwap);

    fn notify(&self, title: &str, body: &str);

    fn install_progress(&self, percent: Option<u8>);
}

/// Production surface: broadcasts [`UiEvent`]s to the connected peers and
/// shows desktop notifications
pub struct BroadcastUi {
    events: broadcast::Sender<UiEvent>,
    desktop_notifications: bool,
}

impl BroadcastUi {
    pub fn new(capacity: usize, desktop_notifications: bool) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            events,
            desktop_notifications,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            debug!("No UI peer connected, event dropped");
        }
    }
}

impl UiSurface for BroadcastUi {
    fn bring_to_foreground(&self) {
        self.publish(UiEvent::ShowWindow);
    }

    fn show_swap(&self, swap: PendingSwap) {
        self.publish(UiEvent::SwapRequested(swap));
    }

    fn notify(&self, title: &str, body: &str) {
        if !self.desktop_notifications {
            debug!("Desktop notifications disabled: {}: {}", title, body);
            return;
        }

        let title = title.to_string();
        let body = body.to_string();
        // The D-Bus round trip blocks
        tokio::task::spawn_blocking(move || {
            let shown = notify_rust::Notification::new()
                .appname(APP_NAME)
                .summary(&title)
                .body(&body)
                .show()
                .map(|_| ());
            if let Err(e) = shown {
                warn!("Failed to show desktop notification: {}", e);
            }
        });
    }

    fn install_progress(&self, percent: Option<u8>) {
        self.publish(UiEvent::InstallProgress(percent));
    }
}
