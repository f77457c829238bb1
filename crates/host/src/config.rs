// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop Host - Config Module
// Loads host.toml (socket location, installer commands, approval policy)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use swapperd_desktop_common::config::{config_dir, default_host_socket_path, default_swapperd_home};
use swapperd_desktop_common::Network;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "host.toml";

/// Host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Network selected at startup
    #[serde(default)]
    pub network: Network,

    /// Unix socket the bridge listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// SwapperD state directory (network configs, accounts file)
    #[serde(default = "default_swapperd_home")]
    pub swapperd_home: PathBuf,

    /// Command (program and arguments) that installs SwapperD
    #[serde(default)]
    pub install_command: Vec<String>,

    /// Command that installs a downloaded app update and restarts
    #[serde(default)]
    pub update_command: Vec<String>,

    /// Reject swap prompts nobody answered after this many seconds.
    /// 0 waits for the UI indefinitely.
    #[serde(default)]
    pub approval_timeout_secs: u64,

    /// Show desktop notifications for `notify` requests
    #[serde(default = "default_desktop_notifications")]
    pub desktop_notifications: bool,

    /// Events buffered per UI peer before the slowest one starts missing them
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_socket_path() -> PathBuf {
    default_host_socket_path()
}

fn default_desktop_notifications() -> bool {
    true
}

fn default_event_buffer() -> usize {
    64
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            socket_path: default_socket_path(),
            swapperd_home: default_swapperd_home(),
            install_command: Vec::new(),
            update_command: Vec::new(),
            approval_timeout_secs: 0,
            desktop_notifications: default_desktop_notifications(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            anyhow::bail!("socket_path must not be empty");
        }
        if self.event_buffer == 0 {
            anyhow::bail!("event_buffer must be at least 1");
        }
        Ok(())
    }

    pub fn approval_timeout(&self) -> Option<Duration> {
        (self.approval_timeout_secs > 0).then(|| Duration::from_secs(self.approval_timeout_secs))
    }

    /// Load host configuration, writing the defaults on first start
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("No host configuration found, using defaults");
            info!("Configuration will be saved to: {}", config_path.display());
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(config_path)
            .context("Failed to read host configuration")?;

        let config: Self = toml::from_str(&contents)
            .context("Failed to parse host configuration")?;

        config.validate()
            .context("Configuration validation failed")?;

        info!("Loaded host configuration from: {}", config_path.display());
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create configuration directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize host configuration")?;

        fs::write(config_path, contents)
            .context("Failed to write host configuration")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(config_path, permissions)
                .context("Failed to set config file permissions")?;
        }

        info!("Saved host configuration to: {}", config_path.display());
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(config_dir()?.join(CONFIG_FILE_NAME))
    }
}
