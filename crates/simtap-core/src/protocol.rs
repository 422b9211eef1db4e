//! JSON-line wire protocol between the client and the simulator.
//!
//! Each request is a single JSON object on one newline-terminated UTF-8 line,
//! carrying a `cmd` discriminator plus command-specific keys. Each control
//! response is likewise one JSON line with at minimum a `status` field
//! (`"ok"`, anything else signals failure) and command-specific fields.
//!
//! Screenshot responses additionally declare a payload `type` and a byte
//! length `len`; exactly `len` raw bytes follow the response line with no
//! additional framing (see [`crate::screenshot`] for how they are decoded).
//!
//! The field names emitted here are the wire contract and must match the
//! simulator exactly.
//!
//! # Example
//!
//! ```
//! use simtap_core::protocol::{encode_command, decode_response, Command};
//!
//! let wire = encode_command(&Command::Click { id: "btn_heart".into() }).unwrap();
//! assert_eq!(wire, br#"{"cmd":"click","id":"btn_heart"}"#);
//!
//! let response = decode_response(br#"{"status":"ok","cmd":"click"}"#).unwrap();
//! assert!(response.is_ok());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during protocol encoding or decoding.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The received line is not well-formed JSON with the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A command failed to serialize.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A typed request to the simulator, one variant per command kind.
///
/// Serializes to a single-line JSON object whose `cmd` field is the
/// discriminator; irrelevant fields are absent by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Click a widget by its identifier.
    Click { id: String },
    /// Press and hold a widget for `ms` milliseconds.
    Longpress { id: String, ms: u32 },
    /// Swipe gesture between two points.
    Swipe { x1: i32, y1: i32, x2: i32, y2: i32 },
    /// Click at absolute screen coordinates.
    ClickAt { x: i32, y: i32 },
    /// Move the pointer without pressing.
    MouseMove { x: i32, y: i32 },
    /// Press-move-release drag between two points.
    Drag { x1: i32, y1: i32, x2: i32, y2: i32 },
    /// Send a key event by code.
    Key { code: u32 },
    /// Read a widget's text content.
    GetState { id: String },
    /// Replace a widget's text content.
    SetText { id: String, text: String },
    /// Let the simulator run its event loop for `ms` milliseconds.
    Wait { ms: u32 },
    /// Capture the rendered frame.
    Screenshot,
}

impl Command {
    /// The wire discriminator for this command, suitable for tracing span
    /// metadata and for matching the server's `cmd` echo.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Click { .. } => "click",
            Command::Longpress { .. } => "longpress",
            Command::Swipe { .. } => "swipe",
            Command::ClickAt { .. } => "click_at",
            Command::MouseMove { .. } => "mouse_move",
            Command::Drag { .. } => "drag",
            Command::Key { .. } => "key",
            Command::GetState { .. } => "get_state",
            Command::SetText { .. } => "set_text",
            Command::Wait { .. } => "wait",
            Command::Screenshot => "screenshot",
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A decoded control response line from the simulator.
///
/// Only `status` is always present. The simulator echoes the command
/// discriminator in `cmd` and attaches a machine-readable reason in `error`
/// on failure (e.g. `widget_not_found`). `text` carries the result of a
/// `get_state`; the `type`/`width`/`height`/`format`/`len` fields are the
/// screenshot payload header. No result field is trusted unless `status`
/// is `"ok"`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub status: String,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub payload_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub len: Option<u64>,
}

impl Response {
    /// Returns `true` if the simulator reported success.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// A human-readable failure reason: the `error` field when present,
    /// otherwise the raw status.
    pub fn failure_reason(&self) -> String {
        self.error.clone().unwrap_or_else(|| self.status.clone())
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encode a [`Command`] as a single JSON line, without the `\n` terminator.
///
/// Compact JSON contains no raw newline characters, so the result is always
/// safe to frame with [`Connection::send_line`](crate::connection::Connection::send_line).
pub fn encode_command(command: &Command) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(command)?)
}

/// Decode a received line into a [`Response`].
pub fn decode_response(line: &[u8]) -> Result<Response, ProtocolError> {
    serde_json::from_slice(line)
        .map_err(|_| ProtocolError::InvalidResponse(String::from_utf8_lossy(line).into_owned()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
