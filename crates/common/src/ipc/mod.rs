// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! Cross-process bridge between the host, the gateway and UI peers.
//!
//! Layers, bottom up:
//! - [`frame`]: NDJSON wire frames
//! - [`transport`]: correlation ids, timeouts, cancellation, handler registry
//! - [`bridge`]: typed calls and handlers bound to the [`message`] catalog

pub mod bridge;
pub mod frame;
pub mod message;
pub mod transport;

pub use bridge::{Bridge, QUERY_TIMEOUT};
pub use frame::{Frame, RemoteError, RemoteErrorCode};
pub use message::*;
pub use transport::{Deadline, Transport};
