// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! HTTP client for the SwapperD daemon API.
//!
//! Every endpoint uses basic auth with an empty username and the unlock
//! password. Amounts are returned exactly as SwapperD reports them (integer
//! strings in base units).

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::network::{DaemonEndpoints, Network};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Balance queries hit every blockchain and can be slow
pub const BALANCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub blockchain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub version: String,
    pub bootloaded: bool,
    #[serde(default)]
    pub supported_tokens: Vec<TokenInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub balance: String,
}

/// Balances keyed by token symbol, sorted
pub type Balances = BTreeMap<String, Balance>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapItem {
    pub id: String,
    #[serde(default)]
    pub send_token: Option<String>,
    #[serde(default)]
    pub receive_token: Option<String>,
    #[serde(default)]
    pub send_amount: String,
    #[serde(default)]
    pub receive_amount: String,
    #[serde(default)]
    pub send_cost: HashMap<String, String>,
    #[serde(default)]
    pub receive_cost: HashMap<String, String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub time_lock: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapsResponse {
    #[serde(default)]
    pub swaps: Option<Vec<SwapItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub to: String,
    pub from: String,
    pub token: TokenInfo,
    pub value: String,
    #[serde(default)]
    pub tx_cost: HashMap<String, String>,
    pub tx_hash: String,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransfersResponse {
    #[serde(default)]
    pub transfers: Option<Vec<TransferItem>>,
}

/// Status and body of an accepted swap submission
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub status: u16,
    pub body: Option<Value>,
}

#[derive(Clone)]
pub struct SwapperdClient {
    client: Client,
    endpoints: DaemonEndpoints,
}

impl SwapperdClient {
    pub fn new(endpoints: DaemonEndpoints) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &DaemonEndpoints {
        &self.endpoints
    }

    fn url(&self, network: Network, path: &str) -> String {
        format!("{}{}", self.endpoints.base_url(network), path)
    }

    fn authed(&self, request: RequestBuilder, password: &str) -> RequestBuilder {
        request.basic_auth("", Some(password))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        network: Network,
        path: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<T> {
        let url = self.url(network, path);
        debug!("GET {}", url);
        let response = self
            .authed(self.client.get(&url), password)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_status_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Upstream(format!("Invalid response from {}: {}", url, e)))
    }

    pub async fn info(&self, network: Network, password: &str) -> Result<InfoResponse> {
        self.get_json(network, "/info", password, DEFAULT_TIMEOUT).await
    }

    pub async fn balances(&self, network: Network, password: &str) -> Result<Balances> {
        self.get_json(network, "/balances", password, BALANCE_TIMEOUT).await
    }

    pub async fn swaps(&self, network: Network, password: &str) -> Result<SwapsResponse> {
        self.get_json(network, "/swaps", password, DEFAULT_TIMEOUT).await
    }

    pub async fn transfers(&self, network: Network, password: &str) -> Result<TransfersResponse> {
        self.get_json(network, "/transfers", password, DEFAULT_TIMEOUT).await
    }

    /// Submit a swap the user approved. Non-2xx answers are errors carrying
    /// SwapperD's message.
    pub async fn submit_swap(&self, network: Network, password: &str, swap: &Value) -> Result<Submission> {
        let url = self.url(network, "/swaps");
        debug!("POST {}", url);
        let response = self
            .authed(self.client.post(&url), password)
            .json(swap)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(upstream_status_error(status, &text));
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        };
        Ok(Submission {
            status: status.as_u16(),
            body,
        })
    }

    /// Bootload every network with the unlock password. True when all
    /// daemons accepted it.
    pub async fn bootload(&self, password: &str) -> bool {
        for network in Network::ALL {
            let url = self.url(network, "/bootload");
            let result = self
                .authed(self.client.post(&url), password)
                .timeout(DEFAULT_TIMEOUT)
                .send()
                .await;
            match result {
                Ok(response) if response.status() == StatusCode::OK => {}
                Ok(response) => {
                    debug!("Bootload of {} returned {}", network, response.status());
                    return false;
                }
                Err(e) => {
                    debug!("Bootload of {} failed: {}", network, e);
                    return false;
                }
            }
        }
        true
    }
}

/// SwapperD reports errors as `{"error": "..."}`; fall back to the raw body
fn upstream_status_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    Error::Upstream(format!("SwapperD returned {}: {}", status, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    // base64(":hunter2")
    const AUTH: &str = "Basic Omh1bnRlcjI=";

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|h| h.to_str().ok()) == Some(AUTH)
    }

    async fn spawn_fake_daemon() -> String {
        let app = Router::new()
            .route(
                "/balances",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err(AxumStatus::UNAUTHORIZED);
                    }
                    Ok(Json(json!({
                        "ETH": {"address": "0xabc", "balance": "1000000000000000000"},
                        "BTC": {"address": "mx1", "balance": "2500"}
                    })))
                }),
            )
            .route(
                "/swaps",
                post(|Json(body): Json<Value>| async move {
                    if body["sendToken"] == "BTC" {
                        (AxumStatus::CREATED, Json(json!({"id": "swap-1"})))
                    } else {
                        (AxumStatus::BAD_REQUEST, Json(json!({"error": "unsupported token"})))
                    }
                }),
            )
            .route("/bootload", post(|| async { AxumStatus::OK }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base: &str) -> SwapperdClient {
        SwapperdClient::new(DaemonEndpoints {
            mainnet: base.to_string(),
            testnet: base.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn balances_are_sorted_and_raw() {
        let base = spawn_fake_daemon().await;
        let client = client_for(&base);

        let balances = client.balances(Network::Testnet, "hunter2").await.unwrap();
        let tokens: Vec<_> = balances.keys().cloned().collect();
        assert_eq!(tokens, vec!["BTC", "ETH"]);
        assert_eq!(balances["ETH"].balance, "1000000000000000000");
    }

    #[tokio::test]
    async fn wrong_password_is_upstream_error() {
        let base = spawn_fake_daemon().await;
        let client = client_for(&base);

        let err = client.balances(Network::Mainnet, "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(m) if m.contains("401")));
    }

    #[tokio::test]
    async fn submit_swap_mirrors_daemon_answer() {
        let base = spawn_fake_daemon().await;
        let client = client_for(&base);

        let ok = client
            .submit_swap(Network::Testnet, "hunter2", &json!({"sendToken": "BTC"}))
            .await
            .unwrap();
        assert_eq!(ok.status, 201);
        assert_eq!(ok.body, Some(json!({"id": "swap-1"})));

        let err = client
            .submit_swap(Network::Testnet, "hunter2", &json!({"sendToken": "DOGE"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(m) if m.contains("unsupported token")));
    }

    #[tokio::test]
    async fn bootload_needs_every_network() {
        let base = spawn_fake_daemon().await;
        assert!(client_for(&base).bootload("hunter2").await);

        let split = SwapperdClient::new(DaemonEndpoints {
            mainnet: base,
            testnet: "http://127.0.0.1:1".into(),
        })
        .unwrap();
        assert!(!split.bootload("hunter2").await);
    }
}
