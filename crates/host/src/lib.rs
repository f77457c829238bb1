// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop Host
// Privileged process: holds the unlocked password and answers bridge calls

pub mod approvals;
pub mod config;
pub mod credentials;
pub mod handlers;
pub mod installer;
pub mod permissions;
pub mod pidfile;
#[cfg(unix)]
pub mod server;
pub mod session;
pub mod ui;

pub use approvals::{Approvals, PendingApproval};
pub use config::HostConfig;
pub use credentials::{CredentialStore, FileCredentialStore};
pub use handlers::HostContext;
pub use installer::{CommandInstaller, Installer};
pub use session::SessionContext;
pub use ui::{BroadcastUi, UiEvent, UiSurface};
