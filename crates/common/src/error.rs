// Error types for SwapperD Desktop

use std::time::Duration;

use thiserror::Error;

use crate::ipc::MessageKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} call timed out after {after:?}")]
    Timeout { kind: MessageKind, after: Duration },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Bridge connection closed")]
    Closed,

    #[error("Wallet is locked")]
    Unauthorized,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Timeouts, a locked wallet and a dropped host link are expected while the
    /// app is running and should be shown as "try again" states, not failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Unauthorized | Error::Closed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
