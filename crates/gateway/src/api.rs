// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! HTTP API served to web pages on localhost.
//!
//! - `GET /version`, `GET /network`: bounded queries to the host
//! - `POST /swaps`: waits, without bound, for the user to approve the swap
//! - any other `GET`: proxied to SwapperD with the unlocked password
//!
//! Every request is its own task, so a swap waiting on the user never holds
//! up the other routes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swapperd_desktop_common::ipc::{ApprovalDecision, GetNetwork, GetPassword, GetVersion, Rpc, Swap, SwapRequest};
use swapperd_desktop_common::{DaemonEndpoints, Network, Result};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::link::HostLink;

/// Shared application state
pub struct AppState {
    pub link: HostLink,
    pub http: reqwest::Client,
    pub daemons: DaemonEndpoints,
    pub query_timeout: Duration,
    pub proxy_timeout: Duration,
}

impl AppState {
    /// Bounded host query. Callers turn failures into degraded answers
    /// (e.g. `503 Network unavailable` for `GetNetwork`) rather than waiting.
    async fn query<R: Rpc>(&self, request: R::Request) -> Result<R::Response> {
        self.link
            .bridge()?
            .call_bounded::<R>(request, self.query_timeout)
            .await
    }
}

/// API error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkQuery {
    network: Option<String>,
}

impl NetworkQuery {
    /// `Ok(None)` when absent, an error response when unparsable
    fn parse(&self) -> std::result::Result<Option<Network>, Response> {
        match self.network.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("{}", e),
                    }),
                )
                    .into_response()
            }),
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/version", get(version))
        .route("/network", get(network))
        .route("/swaps", get(proxy).post(submit_swap))
        .route("/", get(proxy))
        .route("/*path", get(proxy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// App version, answered by the gateway itself when the host is unreachable
async fn version(State(state): State<Arc<AppState>>) -> Response {
    match state.query::<GetVersion>(()).await {
        Ok(version) => (StatusCode::OK, version).into_response(),
        Err(e) => {
            debug!("Version query failed, answering locally: {}", e);
            (StatusCode::OK, env!("CARGO_PKG_VERSION")).into_response()
        }
    }
}

/// Selected network; `503 Network unavailable` when the host does not answer in time
async fn network(State(state): State<Arc<AppState>>) -> Response {
    match state.query::<GetNetwork>(()).await {
        Ok(network) => (StatusCode::OK, network.as_str()).into_response(),
        Err(e) => {
            warn!("Network query failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Network unavailable").into_response()
        }
    }
}

/// Forward a swap to the user for approval. Responds only once the user
/// has decided; dropping the request cancels the prompt.
async fn submit_swap(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NetworkQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let network = match query.parse() {
        Ok(network) => network,
        Err(response) => return response,
    };

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid swap request: {}", e),
                }),
            )
                .into_response();
        }
    };

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    info!("Swap submitted (origin: {})", origin.as_deref().unwrap_or("unknown"));

    let request = SwapRequest { body, network, origin };
    let outcome = match state.link.bridge() {
        Ok(bridge) => bridge.call_unbounded::<Swap>(request).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(decision) => decision_response(decision),
        Err(e) => {
            warn!("Swap approval failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn decision_response(decision: ApprovalDecision) -> Response {
    let status = StatusCode::from_u16(decision.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    match decision {
        ApprovalDecision::Accepted {
            response: Some(body),
            ..
        } => (status, Json(body)).into_response(),
        _ => (status, "").into_response(),
    }
}

fn locked() -> Response {
    (StatusCode::UNAUTHORIZED, "Wallet is locked").into_response()
}

/// Proxy a read request to SwapperD, authenticated with the unlocked password
async fn proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NetworkQuery>,
    uri: Uri,
) -> Response {
    let password = match state.query::<GetPassword>(()).await {
        Ok(Some(password)) => Zeroizing::new(password),
        Ok(None) => return locked(),
        Err(e) => {
            debug!("Password query failed: {}", e);
            return locked();
        }
    };

    let network = match query.parse() {
        Ok(Some(network)) => network,
        Ok(None) => match state.query::<GetNetwork>(()).await {
            Ok(network) => network,
            // Same degraded answer as `/network`
            Err(e) => {
                warn!("Network query failed: {}", e);
                return (StatusCode::SERVICE_UNAVAILABLE, "Network unavailable").into_response();
            }
        },
        Err(response) => return response,
    };

    let url = format!("{}{}", state.daemons.base_url(network), uri.path());
    debug!("Proxying GET {}", url);

    let upstream = match state
        .http
        .get(&url)
        .basic_auth("", Some(password.as_str()))
        .timeout(state.proxy_timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("SwapperD request failed: {}", e);
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream.headers().get(reqwest::header::CONTENT_TYPE).cloned();
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read SwapperD response: {}", e);
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let mut response = Response::builder().status(status);
    if let Some(value) = content_type.as_ref().and_then(|v| v.to_str().ok()) {
        response = response.header(header::CONTENT_TYPE, value);
    }
    response
        .body(Body::from(bytes))
        .unwrap_or_else(|e| (StatusCode::BAD_GATEWAY, e.to_string()).into_response())
}
