// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// Credential store: password hashes for local accounts

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_ACCOUNT: &str = "master";
pub const ACCOUNTS_FILE_NAME: &str = "accounts.toml";
/// bcrypt work factor for stored password hashes
pub const HASH_COST: u32 = 10;

/// Hashing is deliberately slow; async callers should run these methods on
/// a blocking thread.
pub trait CredentialStore: Send + Sync {
    fn exists(&self, account: &str) -> Result<bool>;

    fn verify(&self, account: &str, password: &str) -> Result<bool>;

    /// Store a password hash, replacing any previous one
    fn create(&self, account: &str, password: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    /// bcrypt hash in modular crypt format, salt included
    password_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: BTreeMap<String, AccountRecord>,
}

/// bcrypt hashes in a TOML file (mode 0600)
pub struct FileCredentialStore {
    path: PathBuf,
    cost: u32,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_cost(path, HASH_COST)
    }

    pub fn with_cost(path: impl Into<PathBuf>, cost: u32) -> Self {
        Self {
            path: path.into(),
            cost,
            write_lock: Mutex::new(()),
        }
    }

    /// Store under the SwapperD home directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ACCOUNTS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<AccountsFile> {
        if !self.path.exists() {
            return Ok(AccountsFile::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn save(&self, file: &AccountsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create credentials directory")?;
        }

        let contents = toml::to_string_pretty(file).context("Failed to serialize accounts")?;
        fs::write(&self.path, contents).context("Failed to write accounts file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions)
                .context("Failed to set accounts file permissions")?;
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn exists(&self, account: &str) -> Result<bool> {
        Ok(self.load()?.accounts.contains_key(account))
    }

    fn verify(&self, account: &str, password: &str) -> Result<bool> {
        let file = self.load()?;
        let record = file
            .accounts
            .get(account)
            .ok_or_else(|| anyhow::anyhow!("No account named '{}'", account))?;
        bcrypt::verify(password, &record.password_hash)
            .with_context(|| format!("Corrupt password hash for account '{}'", account))
    }

    fn create(&self, account: &str, password: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = self.load()?;
        let record = AccountRecord {
            password_hash: bcrypt::hash(password, self.cost).context("Failed to hash password")?,
        };
        file.accounts.insert(account.to_string(), record);
        self.save(&file)?;

        info!("Stored password hash for account '{}'", account);
        Ok(())
    }
}
