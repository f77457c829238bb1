// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

//! Message catalog shared by every bridge peer.
//!
//! Each entry of the `catalog!` table below declares one [`MessageKind`]
//! variant, a marker type of the same name and the payload types it carries.
//! Request/reply kinds implement [`Rpc`]; one-way kinds implement
//! [`Notification`]. Adding an interaction means adding one line to the
//! table and registering a handler for it.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::network::Network;

/// A request/reply interaction with a statically known payload pairing
pub trait Rpc: 'static {
    const KIND: MessageKind;
    type Request: Serialize + DeserializeOwned + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// A one-way message delivered to every subscribed listener
pub trait Notification: 'static {
    const KIND: MessageKind;
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

macro_rules! catalog {
    (
        rpc {
            $( $(#[$rpc_doc:meta])* $rpc:ident = $rpc_name:literal : $request:ty => $response:ty; )*
        }
        notify {
            $( $(#[$note_doc:meta])* $note:ident = $note_name:literal : $payload:ty; )*
        }
    ) => {
        /// Every message kind the bridge understands.
        ///
        /// Unrecognised wire names decode as [`MessageKind::Unknown`] so the
        /// serving side can answer them with a protocol error.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum MessageKind {
            $( #[serde(rename = $rpc_name)] $rpc, )*
            $( #[serde(rename = $note_name)] $note, )*
            #[serde(other, rename = "unknown")]
            Unknown,
        }

        impl MessageKind {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( MessageKind::$rpc => $rpc_name, )*
                    $( MessageKind::$note => $note_name, )*
                    MessageKind::Unknown => "unknown",
                }
            }

            /// Whether the kind is a request/reply interaction
            pub fn expects_reply(&self) -> bool {
                matches!(self, $( MessageKind::$rpc )|*)
            }
        }

        $(
            $(#[$rpc_doc])*
            #[derive(Debug, Clone, Copy)]
            pub struct $rpc;

            impl Rpc for $rpc {
                const KIND: MessageKind = MessageKind::$rpc;
                type Request = $request;
                type Response = $response;
            }
        )*

        $(
            $(#[$note_doc])*
            #[derive(Debug, Clone, Copy)]
            pub struct $note;

            impl Notification for $note {
                const KIND: MessageKind = MessageKind::$note;
                type Payload = $payload;
            }
        )*
    };
}

catalog! {
    rpc {
        /// Whether an account has been created on this machine
        CheckSetup = "check_setup": () => bool;
        /// Install SwapperD, store the password hash and return the mnemonic
        CreateAccount = "create_account": CreateAccountRequest => String;
        /// Show a desktop notification
        Notify = "notify": NotifyRequest => ();
        /// Check a password; a match also unlocks the session
        VerifyPassword = "verify_password": VerifyPasswordRequest => bool;
        /// The unlocked password, `None` while locked
        GetPassword = "get_password": () => Option<String>;
        GetNetwork = "get_network": () => Network;
        SetNetwork = "set_network": Network => ();
        /// Forget the unlocked password
        Lock = "lock": () => ();
        /// Version of the desktop app
        GetVersion = "get_version": () => String;
        /// Ask the user to approve a swap. Brings the UI to the foreground and
        /// resolves only once the user decides.
        Swap = "swap": SwapRequest => ApprovalDecision;
        /// Swaps still waiting for approval, oldest first. UI peers call this
        /// on connect to pick up prompts opened before they subscribed.
        PendingSwaps = "pending_swaps": () => Vec<PendingSwap>;
        UpdateSwapperD = "update_swapperd": UpdateSwapperDRequest => ();
    }
    notify {
        /// The user's decision for a pending swap (UI to host)
        SwapResponse = "swap_response": SwapDecision;
        /// A swap is waiting for approval (host to UI)
        SwapRequested = "swap_requested": PendingSwap;
        ShowWindow = "show_window": ();
        /// Installer progress in percent, `None` once finished
        InstallProgress = "install_progress": Option<u8>;
        /// An app update has been downloaded and is ready to install
        UpdateReady = "update_ready": String;
        /// Latest published SwapperD version
        LatestVersion = "latest_version": String;
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub mnemonic: Option<String>,
    pub password: String,
}

impl fmt::Debug for CreateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccountRequest")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VerifyPasswordRequest {
    pub password: String,
}

impl fmt::Debug for VerifyPasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyPasswordRequest")
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
}

/// A swap submitted through the gateway by a third-party page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Swap request JSON exactly as posted
    pub body: Value,
    #[serde(default)]
    pub network: Option<Network>,
    /// `Origin` header of the submitting page
    #[serde(default)]
    pub origin: Option<String>,
}

/// Terminal state of an approval prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// The user accepted and the swap was submitted to SwapperD.
    /// `status` and `response` mirror SwapperD's answer.
    Accepted {
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        response: Option<Value>,
    },
    Rejected,
}

impl ApprovalDecision {
    /// HTTP status reported to the page that submitted the swap
    pub fn http_status(&self) -> u16 {
        match self {
            ApprovalDecision::Accepted { status, .. } => status.unwrap_or(201),
            ApprovalDecision::Rejected => 403,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ApprovalDecision::Accepted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSwap {
    pub approval_id: Uuid,
    pub request: SwapRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapDecision {
    pub approval_id: Uuid,
    pub decision: ApprovalDecision,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSwapperDRequest {
    /// Reinstall SwapperD
    #[serde(default)]
    pub swapperd: bool,
    /// Quit and install a downloaded app update
    #[serde(default)]
    pub restart: bool,
}
