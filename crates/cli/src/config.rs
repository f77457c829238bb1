// SwapperD Desktop CLI - Config Module
// Where to find the host and the SwapperD daemons

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use swapperd_desktop_common::config::{config_dir, default_host_socket_path};
use swapperd_desktop_common::DaemonEndpoints;

pub const CONFIG_FILE_NAME: &str = "cli.toml";

/// CLI configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// The host's bridge socket
    #[serde(default = "default_host_socket")]
    pub host_socket: PathBuf,

    /// SwapperD base URLs, used to submit approved swaps and list balances
    #[serde(default)]
    pub daemons: DaemonEndpoints,
}

fn default_host_socket() -> PathBuf {
    default_host_socket_path()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            host_socket: default_host_socket(),
            daemons: DaemonEndpoints::default(),
        }
    }
}

impl CliConfig {
    /// Load CLI configuration from file, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents =
            fs::read_to_string(config_path).context("Failed to read CLI configuration")?;

        let config: Self =
            toml::from_str(&contents).context("Failed to parse CLI configuration")?;

        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(config_dir()?.join(CONFIG_FILE_NAME))
    }
}
