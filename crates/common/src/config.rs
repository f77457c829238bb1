// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// Shared locations for configuration files and the host socket

use std::path::PathBuf;

use anyhow::Result;

pub const APP_DIR_NAME: &str = "swapperd-desktop";
pub const HOST_SOCKET_NAME: &str = "host.sock";

/// Directory holding `host.toml`, `gateway.toml` and `cli.toml`
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join(APP_DIR_NAME))
}

/// Runtime directory for the host socket and PID file.
///
/// Falls back to the cache directory, then the temp directory, on platforms
/// without an XDG runtime directory.
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Default path of the host's bridge socket
pub fn default_host_socket_path() -> PathBuf {
    runtime_dir().join(HOST_SOCKET_NAME)
}

/// Where SwapperD keeps its state (network configs, account database)
pub fn default_swapperd_home() -> PathBuf {
    #[cfg(windows)]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swapperd")
    }
    #[cfg(not(windows))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".swapperd")
    }
}
