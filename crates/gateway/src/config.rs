// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop Gateway - Config Module
// Loads gateway.toml (bind address, host socket, SwapperD endpoints)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use swapperd_desktop_common::config::{config_dir, default_host_socket_path};
use swapperd_desktop_common::network::format_host_port;
use swapperd_desktop_common::{is_loopback_address, DaemonEndpoints};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "gateway.toml";
pub const DEFAULT_PORT: u16 = 7928;

/// Gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Bind host, must be a loopback address
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// The host's bridge socket
    #[serde(default = "default_host_socket")]
    pub host_socket: PathBuf,

    /// SwapperD base URLs
    #[serde(default)]
    pub daemons: DaemonEndpoints,

    /// Budget for password, network and version queries
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Budget for a proxied SwapperD request (balances can be slow)
    #[serde(default = "default_proxy_timeout_secs")]
    pub proxy_timeout_secs: u64,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    DEFAULT_PORT
}

fn default_host_socket() -> PathBuf {
    default_host_socket_path()
}

fn default_query_timeout_secs() -> u64 {
    10
}

fn default_proxy_timeout_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
            host_socket: default_host_socket(),
            daemons: DaemonEndpoints::default(),
            query_timeout_secs: default_query_timeout_secs(),
            proxy_timeout_secs: default_proxy_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// The gateway hands out the unlocked wallet to whoever can reach it, so
    /// it never listens beyond loopback.
    pub fn validate(&self) -> Result<()> {
        if !is_loopback_address(&self.bind_host) {
            anyhow::bail!(
                "Security violation: the gateway must bind to a loopback address (bind_host: {}).\n\
                 Use 127.0.0.1, ::1 or localhost in gateway.toml.",
                self.bind_host
            );
        }
        if self.query_timeout_secs == 0 {
            anyhow::bail!("query_timeout_secs must be at least 1");
        }
        if self.proxy_timeout_secs == 0 {
            anyhow::bail!("proxy_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format_host_port(&self.bind_host, self.bind_port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    /// Load gateway configuration, writing the defaults on first start
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("No gateway configuration found, using defaults");
            info!("Configuration will be saved to: {}", config_path.display());
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(config_path)
            .context("Failed to read gateway configuration")?;

        let config: Self = toml::from_str(&contents)
            .context("Failed to parse gateway configuration")?;

        config.validate()
            .context("Configuration validation failed")?;

        info!("Loaded gateway configuration from: {}", config_path.display());
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create configuration directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize gateway configuration")?;

        fs::write(config_path, contents)
            .context("Failed to write gateway configuration")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(config_path, permissions)
                .context("Failed to set config file permissions")?;
        }

        info!("Saved gateway configuration to: {}", config_path.display());
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(config_dir()?.join(CONFIG_FILE_NAME))
    }
}
