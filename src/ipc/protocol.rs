//! JSON-lines wire format for the stdio boundary.
//!
//! Each stdin line is one [`IpcCommand`], each stdout line one [`IpcEvent`].

use crate::channel::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// IPC Events (Rust → client)
// ============================================================================

/// Serialized with an `"event"` tag field for type discrimination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum IpcEvent {
    /// Every bound endpoint; sent on startup and on `list_channels`
    #[serde(rename = "channels")]
    Channels {
        version: String,
        requests: Vec<String>,
        streams: Vec<String>,
    },

    #[serde(rename = "success")]
    Success { id: u64, result: Value },

    #[serde(rename = "error")]
    Error {
        id: u64,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },

    /// Unknown method or channel. Not an error.
    #[serde(rename = "not_implemented")]
    NotImplemented { id: u64 },

    #[serde(rename = "stream")]
    Stream { channel: String, data: Value },

    #[serde(rename = "stream_error")]
    StreamError {
        channel: String,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },

    #[serde(rename = "end_of_stream")]
    EndOfStream { channel: String },

    /// A stdin line that could not be parsed
    #[serde(rename = "protocol_error")]
    ProtocolError { message: String },
}

impl IpcEvent {
    pub fn from_response(id: u64, response: Response) -> Self {
        match response {
            Response::Success(result) => IpcEvent::Success { id, result },
            Response::Error {
                code,
                message,
                details,
            } => IpcEvent::Error {
                id,
                code,
                message,
                details,
            },
            Response::NotImplemented => IpcEvent::NotImplemented { id },
        }
    }
}

// ============================================================================
// IPC Commands (client → Rust)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd")]
pub enum IpcCommand {
    /// Invoke `method` on the request endpoint at `channel`
    #[serde(rename = "call")]
    Call {
        id: u64,
        channel: String,
        method: String,
        #[serde(default)]
        args: Value,
    },

    /// Subscribe to the stream endpoint at `channel`
    #[serde(rename = "listen")]
    Listen {
        channel: String,
        #[serde(default)]
        args: Value,
    },

    #[serde(rename = "cancel")]
    Cancel {
        channel: String,
        #[serde(default)]
        args: Value,
    },

    /// Re-emit the channels event
    #[serde(rename = "list_channels")]
    ListChannels,
}
