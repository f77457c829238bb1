// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD installation and app updates, delegated to external commands

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{info, warn};

/// Network config files that carry the wallet mnemonic
const NETWORK_CONFIG_FILES: [&str; 2] = ["testnet.json", "mainnet.json"];

#[async_trait]
pub trait Installer: Send + Sync {
    /// Install or reinstall SwapperD. When `mnemonic` is given it replaces
    /// the generated one. Returns the mnemonic now in use.
    async fn install(&self, mnemonic: Option<String>) -> Result<String>;

    /// Quit and install a downloaded app update
    async fn restart_and_update(&self) -> Result<()>;
}

pub struct CommandInstaller {
    swapperd_home: PathBuf,
    install_command: Vec<String>,
    update_command: Vec<String>,
}

impl CommandInstaller {
    pub fn new(swapperd_home: PathBuf, install_command: Vec<String>, update_command: Vec<String>) -> Self {
        Self {
            swapperd_home,
            install_command,
            update_command,
        }
    }

    async fn run(&self, what: &str, command: &[String]) -> Result<()> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("No {} command configured", what))?;

        info!("Running {} command: {}", what, program);
        let status = Command::new(program)
            .args(args)
            .env("SWAPPERD_HOME", &self.swapperd_home)
            .status()
            .await
            .with_context(|| format!("Failed to start {} command '{}'", what, program))?;

        if !status.success() {
            anyhow::bail!("{} command exited with {}", what, status);
        }
        Ok(())
    }
}

#[async_trait]
impl Installer for CommandInstaller {
    async fn install(&self, mnemonic: Option<String>) -> Result<String> {
        self.run("install", &self.install_command).await?;

        if let Some(mnemonic) = mnemonic.as_deref().filter(|m| !m.trim().is_empty()) {
            for name in NETWORK_CONFIG_FILES {
                let path = self.swapperd_home.join(name);
                if path.exists() {
                    write_mnemonic(&path, mnemonic)?;
                } else {
                    warn!("Could not find {}", path.display());
                }
            }
        }

        read_mnemonic(&self.swapperd_home.join(NETWORK_CONFIG_FILES[0]))
    }

    async fn restart_and_update(&self) -> Result<()> {
        self.run("update", &self.update_command).await
    }
}

fn read_config(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_mnemonic(path: &Path, mnemonic: &str) -> Result<()> {
    let mut config = read_config(path)?;
    let object = config
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("{} is not a JSON object", path.display()))?;
    object.insert("mnemonic".to_string(), Value::String(mnemonic.to_string()));

    let contents = serde_json::to_string(&config)?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_mnemonic(path: &Path) -> Result<String> {
    read_config(path)?
        .get("mnemonic")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("No mnemonic in {}", path.display()))
}
