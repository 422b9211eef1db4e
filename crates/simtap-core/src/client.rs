//! High-level client for driving the simulator.
//!
//! [`SimulatorClient`] is the public façade: one round-trip method per
//! command kind, composing the [`Connection`] transport with the protocol
//! codec (and the screenshot decoder for frame captures).
//!
//! The protocol is strictly request/response over one socket with no
//! pipelining and no request IDs; a second command must not be issued before
//! the prior response, including any trailing raw payload, has been fully
//! drained, or the byte stream desynchronizes for the life of the
//! connection. All methods take `&mut self`, so the borrow checker enforces
//! the single outstanding request; callers needing shared access must wrap
//! the client in their own lock.
//!
//! Command methods swallow transport and protocol failures at the
//! per-command boundary, reporting a plain `bool` (or `Option` for value
//! reads) and logging the underlying error. Scripted automation sequences
//! can then continue past a single failed step without per-call error
//! handling. [`try_screenshot`](SimulatorClient::try_screenshot) is the
//! typed exception for callers that want the structured failure.
//!
//! # Example
//!
//! ```no_run
//! use simtap_core::client::SimulatorClient;
//! use simtap_core::connection::ConnectionConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SimulatorClient::new(ConnectionConfig::default());
//! client.connect().await?;
//!
//! if client.click("btn_heart").await {
//!     if let Some(bpm) = client.get_state("lbl_bpm").await {
//!         println!("bpm: {bpm}");
//!     }
//! }
//! client.screenshot(Some("watchface.png".as_ref())).await;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use thiserror::Error;
use tracing::{debug, debug_span, warn, Instrument};

use crate::connection::{Connection, ConnectionConfig, SimulatorStream, TransportError};
use crate::protocol::{decode_response, encode_command, Command, ProtocolError, Response};
use crate::screenshot::{self, ScreenshotError, ScreenshotPayload};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// The structured failure behind the façade's boolean results.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The transport failed mid round trip.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response line did not parse.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The screenshot payload was invalid or undecodable.
    #[error("screenshot error: {0}")]
    Screenshot(#[from] ScreenshotError),

    /// The simulator rejected the command.
    #[error("command rejected: {0}")]
    CommandFailed(String),
}

// ---------------------------------------------------------------------------
// SimulatorClient
// ---------------------------------------------------------------------------

/// Client façade for the simulator's control protocol.
pub struct SimulatorClient {
    connection: Connection,
}

impl SimulatorClient {
    /// Create a disconnected client targeting the configured endpoint.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            connection: Connection::new(config),
        }
    }

    /// Create a client from a pre-connected stream.
    pub fn from_stream(stream: impl SimulatorStream + 'static) -> Self {
        Self {
            connection: Connection::from_stream(stream),
        }
    }

    /// Establish the TCP connection to the simulator.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        self.connection.connect().await
    }

    /// Close the connection. Idempotent.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Returns `true` if the client currently holds an open connection.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    /// One full exchange: encode, send the request line, read the response
    /// line, decode.
    async fn round_trip(&mut self, command: &Command) -> Result<Response, ClientError> {
        let span = debug_span!("round_trip", command = command.name());
        async {
            let line = encode_command(command)?;
            self.connection.send_line(&line).await?;

            let reply = self.connection.recv_line().await?;
            if reply.is_empty() {
                // Peer closed between request and response.
                self.connection.disconnect();
                return Err(ClientError::Transport(TransportError::NoResponse));
            }
            Ok(decode_response(&reply)?)
        }
        .instrument(span)
        .await
    }

    /// Issue a command and reduce the outcome to a success flag.
    async fn command_ok(&mut self, command: Command) -> bool {
        match self.round_trip(&command).await {
            Ok(response) if response.is_ok() => true,
            Ok(response) => {
                warn!(
                    command = command.name(),
                    reason = %response.failure_reason(),
                    "command rejected"
                );
                false
            }
            Err(e) => {
                warn!(command = command.name(), error = %e, "command failed");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Input simulation
    // -----------------------------------------------------------------------

    /// Click a widget by its identifier.
    pub async fn click(&mut self, widget_id: &str) -> bool {
        self.command_ok(Command::Click {
            id: widget_id.to_string(),
        })
        .await
    }

    /// Press and hold a widget for `duration_ms` milliseconds.
    pub async fn longpress(&mut self, widget_id: &str, duration_ms: u32) -> bool {
        self.command_ok(Command::Longpress {
            id: widget_id.to_string(),
            ms: duration_ms,
        })
        .await
    }

    /// Swipe gesture from `(x1, y1)` to `(x2, y2)`.
    pub async fn swipe(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        self.command_ok(Command::Swipe { x1, y1, x2, y2 }).await
    }

    /// Press-move-release drag from `(x1, y1)` to `(x2, y2)`.
    pub async fn drag(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        self.command_ok(Command::Drag { x1, y1, x2, y2 }).await
    }

    /// Click at absolute screen coordinates.
    pub async fn click_at(&mut self, x: i32, y: i32) -> bool {
        self.command_ok(Command::ClickAt { x, y }).await
    }

    /// Move the pointer without pressing.
    pub async fn mouse_move(&mut self, x: i32, y: i32) -> bool {
        self.command_ok(Command::MouseMove { x, y }).await
    }

    /// Send a key event by code.
    pub async fn key(&mut self, code: u32) -> bool {
        self.command_ok(Command::Key { code }).await
    }

    /// Replace a widget's text content.
    pub async fn set_text(&mut self, widget_id: &str, text: &str) -> bool {
        self.command_ok(Command::SetText {
            id: widget_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    /// Let the simulator run its event loop for `duration_ms` milliseconds.
    pub async fn wait(&mut self, duration_ms: u32) -> bool {
        self.command_ok(Command::Wait { ms: duration_ms }).await
    }

    // -----------------------------------------------------------------------
    // State retrieval
    // -----------------------------------------------------------------------

    /// Read a widget's text content. Returns `None` when the widget does not
    /// exist, the simulator reports failure, or the exchange fails.
    pub async fn get_state(&mut self, widget_id: &str) -> Option<String> {
        let command = Command::GetState {
            id: widget_id.to_string(),
        };
        match self.round_trip(&command).await {
            Ok(response) if response.is_ok() => response.text,
            Ok(response) => {
                warn!(
                    widget = widget_id,
                    reason = %response.failure_reason(),
                    "get_state rejected"
                );
                None
            }
            Err(e) => {
                warn!(widget = widget_id, error = %e, "get_state failed");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Screenshots
    // -----------------------------------------------------------------------

    /// Capture the rendered frame as PNG bytes, propagating the structured
    /// error on failure.
    ///
    /// No bytes are read past the response line unless its header validates,
    /// so a rejected capture leaves the stream framed for the next command.
    pub async fn try_screenshot(&mut self) -> Result<Vec<u8>, ClientError> {
        let response = self.round_trip(&Command::Screenshot).await?;
        if !response.is_ok() {
            return Err(ClientError::CommandFailed(response.failure_reason()));
        }

        let payload = ScreenshotPayload::from_response(&response)?;
        let bytes = match self.connection.recv_exact(payload.byte_len()).await {
            Ok(bytes) => bytes,
            Err(TransportError::ShortRead { received, expected }) => {
                return Err(ClientError::Screenshot(ScreenshotError::IncompleteData {
                    received,
                    expected,
                }));
            }
            Err(e) => return Err(e.into()),
        };

        let png = screenshot::decode(&payload, bytes)?;
        debug!(png_bytes = png.len(), "screenshot decoded");
        Ok(png)
    }

    /// Capture the rendered frame, optionally persisting it to `save_path`.
    ///
    /// The destination handle is opened, written, and released on every exit
    /// path, including decode failure (nothing is opened until the PNG bytes
    /// exist). Returns the PNG bytes, or `None` on any failure.
    pub async fn screenshot(&mut self, save_path: Option<&Path>) -> Option<Vec<u8>> {
        match self.try_screenshot().await {
            Ok(png) => {
                if let Some(path) = save_path {
                    if let Err(e) = tokio::fs::write(path, &png).await {
                        warn!(path = %path.display(), error = %e, "failed to save screenshot");
                        return None;
                    }
                    debug!(path = %path.display(), png_bytes = png.len(), "screenshot saved");
                }
                Some(png)
            }
            Err(e) => {
                warn!(error = %e, "screenshot failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
