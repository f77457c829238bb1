// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! Typed RPC bridge over the correlated transport.
//!
//! Two call styles:
//! - bounded calls ([`Bridge::call_bounded`]) for status checks, where the
//!   caller degrades gracefully on [`Error::Timeout`];
//! - unbounded calls ([`Bridge::call_unbounded`]) for kinds that complete
//!   only after a human acts, such as [`Swap`](super::Swap). Callers must not
//!   assume any upper bound; dropping the future cancels the call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::transport::{Deadline, Transport};
use super::{Notification, Rpc};
use crate::error::{Error, Result};

/// Budget for liveness and status queries
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Bridge {
    transport: Transport,
}

impl Bridge {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Connect to a bridge peer listening on a Unix socket
    #[cfg(unix)]
    pub async fn connect(path: &std::path::Path) -> Result<Self> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        Ok(Self::new(Transport::from_unix(stream)))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn call<R: Rpc>(&self, request: R::Request, deadline: Deadline) -> Result<R::Response> {
        let payload = serde_json::to_value(&request)?;
        let value = self.transport.call(R::KIND, payload, deadline).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed {} response: {}", R::KIND, e)))
    }

    pub async fn call_bounded<R: Rpc>(&self, request: R::Request, timeout: Duration) -> Result<R::Response> {
        self.call::<R>(request, Deadline::After(timeout)).await
    }

    pub async fn call_unbounded<R: Rpc>(&self, request: R::Request) -> Result<R::Response> {
        self.call::<R>(request, Deadline::Never).await
    }

    /// Serve `R` with an async handler. Handler errors are sent back to the
    /// caller as [`Error::Handler`]; a payload that does not decode as
    /// `R::Request` is answered with [`Error::Protocol`].
    pub fn handle<R, F, Fut>(&self, handler: F)
    where
        R: Rpc,
        F: Fn(R::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R::Response>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.transport.on(R::KIND, move |payload| {
            let handler = Arc::clone(&handler);
            async move {
                let request: R::Request = serde_json::from_value(payload)
                    .map_err(|e| Error::Protocol(format!("malformed {} payload: {}", R::KIND, e)))?;
                let response = handler(request)
                    .await
                    .map_err(|e| Error::Handler(format!("{:#}", e)))?;
                Ok(serde_json::to_value(response)?)
            }
        });
    }

    /// Run `listener` for every `N` notification received
    pub fn subscribe<N, F>(&self, listener: F)
    where
        N: Notification,
        F: Fn(N::Payload) + Send + Sync + 'static,
    {
        self.transport.listen(N::KIND, move |payload| {
            match serde_json::from_value::<N::Payload>(payload) {
                Ok(payload) => listener(payload),
                Err(e) => warn!("Ignoring malformed {} notification: {}", N::KIND, e),
            }
        });
    }

    pub fn notify<N: Notification>(&self, payload: N::Payload) -> Result<()> {
        let payload = serde_json::to_value(&payload)?;
        self.transport.notify(N::KIND, payload)
    }

    pub async fn closed(&self) {
        self.transport.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}
