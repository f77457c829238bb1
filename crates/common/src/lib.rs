// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop - Common Library
// Bridge protocol, message catalog, SwapperD client and shared configuration

pub mod config;
pub mod error;
pub mod ipc;
pub mod network;
pub mod swapperd;

pub use error::{Error, Result};
pub use ipc::{Bridge, Deadline, MessageKind, Transport, QUERY_TIMEOUT};
pub use network::{is_loopback_address, DaemonEndpoints, Network};
pub use swapperd::SwapperdClient;

// Re-export commonly used external types
pub use uuid::Uuid;
