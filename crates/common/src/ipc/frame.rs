//! Wire frames for the bridge.
//!
//! Wire format: NDJSON (one JSON object per line, terminated by `\n`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MessageKind;
use crate::error::Error;

/// One line on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Request {
        id: u64,
        kind: MessageKind,
        #[serde(default)]
        payload: Value,
    },
    Reply {
        id: u64,
        kind: MessageKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
    },
    Notify {
        kind: MessageKind,
        #[serde(default)]
        payload: Value,
    },
    /// The caller gave up on a request; the serving side aborts its handler
    Cancel { id: u64, kind: MessageKind },
}

impl Frame {
    pub fn reply(id: u64, kind: MessageKind, outcome: Result<Value, RemoteError>) -> Self {
        match outcome {
            Ok(value) => Frame::Reply {
                id,
                kind,
                result: Some(value),
                error: None,
            },
            Err(error) => Frame::Reply {
                id,
                kind,
                result: None,
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorCode {
    /// The handler ran and failed
    Handler,
    /// The request could not be dispatched (unknown kind, bad payload)
    Protocol,
}

/// Error carried in a reply frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
}

impl RemoteError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self {
            code: RemoteErrorCode::Handler,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            code: RemoteErrorCode::Protocol,
            message: message.into(),
        }
    }
}

impl From<&Error> for RemoteError {
    fn from(err: &Error) -> Self {
        match err {
            Error::Protocol(message) => RemoteError::protocol(message.clone()),
            Error::Handler(message) => RemoteError::handler(message.clone()),
            other => RemoteError::handler(other.to_string()),
        }
    }
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err.code {
            RemoteErrorCode::Handler => Error::Handler(err.message),
            RemoteErrorCode::Protocol => Error::Protocol(err.message),
        }
    }
}

/// Best-effort id of a request line that failed to decode as a [`Frame`]
pub(crate) fn undecodable_request_id(line: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(line).ok()?;
    if value.get("type")?.as_str()? != "request" {
        return None;
    }
    value.get("id")?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let frame = Frame::Request {
            id: 7,
            kind: MessageKind::GetPassword,
            payload: Value::Null,
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "request", "id": 7, "kind": "get_password", "payload": null})
        );
    }

    #[test]
    fn test_reply_carries_result_or_error() {
        let ok = Frame::reply(1, MessageKind::GetNetwork, Ok(json!("testnet")));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"type": "reply", "id": 1, "kind": "get_network", "result": "testnet"})
        );

        let err = Frame::reply(
            2,
            MessageKind::GetPassword,
            Err(RemoteError::handler("SwapperD locked")),
        );
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "type": "reply", "id": 2, "kind": "get_password",
                "error": {"code": "handler", "message": "SwapperD locked"}
            })
        );
    }

    #[test]
    fn test_request_without_payload_decodes_as_null() {
        let frame: Frame =
            serde_json::from_str(r#"{"type":"request","id":3,"kind":"check_setup"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Request {
                id: 3,
                kind: MessageKind::CheckSetup,
                payload: Value::Null
            }
        );
    }

    #[test]
    fn test_undecodable_request_id() {
        assert_eq!(undecodable_request_id(r#"{"type":"request","id":9,"kind":42}"#), Some(9));
        assert_eq!(undecodable_request_id(r#"{"type":"notify","id":9}"#), None);
        assert_eq!(undecodable_request_id("not json"), None);
    }

    #[test]
    fn test_remote_error_maps_to_error_variants() {
        let err: Error = RemoteError::protocol("no handler").into();
        assert!(matches!(err, Error::Protocol(m) if m == "no handler"));

        let err: Error = RemoteError::handler("boom").into();
        assert!(matches!(err, Error::Handler(m) if m == "boom"));

        let remote = RemoteError::from(&Error::Unauthorized);
        assert_eq!(remote.code, RemoteErrorCode::Handler);
        assert_eq!(remote.message, "Wallet is locked");
    }
}
