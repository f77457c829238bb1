// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop Gateway
// Localhost HTTP API bridging web pages to the host

pub mod api;
pub mod config;
pub mod link;

pub use api::{create_router, AppState};
pub use config::GatewayConfig;
pub use link::HostLink;
