// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// Network selection and address helpers

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const MAINNET_ENDPOINT: &str = "http://localhost:7927";
pub const TESTNET_ENDPOINT: &str = "http://localhost:17927";

/// SwapperD network. Each network is served by its own daemon instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Human readable label shown in UIs
    pub fn label(&self) -> &'static str {
        match self {
            Network::Mainnet => "Main Network",
            Network::Testnet => "Test Network",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(Error::Config(format!("Invalid network: {}", other))),
        }
    }
}

/// Base URLs of the SwapperD daemons, one per network
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DaemonEndpoints {
    #[serde(default = "default_mainnet_url")]
    pub mainnet: String,

    #[serde(default = "default_testnet_url")]
    pub testnet: String,
}

fn default_mainnet_url() -> String {
    MAINNET_ENDPOINT.to_string()
}

fn default_testnet_url() -> String {
    TESTNET_ENDPOINT.to_string()
}

impl Default for DaemonEndpoints {
    fn default() -> Self {
        Self {
            mainnet: default_mainnet_url(),
            testnet: default_testnet_url(),
        }
    }
}

impl DaemonEndpoints {
    /// Base URL for a network, without trailing slash
    pub fn base_url(&self, network: Network) -> &str {
        let url = match network {
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        };
        url.trim_end_matches('/')
    }
}

/// Check if a host address is a loopback address
/// Supports IPv4 (127.0.0.1, 127.x.x.x), IPv6 (::1), and hostname (localhost)
pub fn is_loopback_address(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback();
    }

    // Unparsable hosts are treated as non-loopback
    false
}

/// Join host and port, bracketing IPv6 literals
pub fn format_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
