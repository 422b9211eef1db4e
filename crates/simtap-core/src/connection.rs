//! Async transport layer for the simulator's TCP control channel.
//!
//! This module provides [`Connection`], which owns the socket and the two
//! byte-level receive primitives the wire protocol needs: line-oriented reads
//! for JSON control messages ([`recv_line`](Connection::recv_line)) and
//! exact-count reads for the raw screenshot payload that follows a screenshot
//! response line ([`recv_exact`](Connection::recv_exact)).
//!
//! Socket reads are not guaranteed to return the full requested count in a
//! single call, so `recv_exact` accumulates across reads until the declared
//! byte count has been drained. A short delivery is a hard error, never a
//! short buffer: returning fewer bytes than declared would leave the stream
//! desynchronized between the line-oriented channel and the binary payload.
//!
//! # Example
//!
//! ```no_run
//! use simtap_core::connection::{Connection, ConnectionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = Connection::new(ConnectionConfig::default());
//! conn.connect().await?;
//! conn.send_line(br#"{"cmd":"wait","ms":100}"#).await?;
//! let reply = conn.recv_line().await?;
//! conn.disconnect();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default simulator host (the simulator only listens on loopback).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port the simulator's control server listens on.
pub const DEFAULT_PORT: u16 = 12345;

/// Default timeout for establishing the TCP connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a single receive operation.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// SimulatorStream trait
// ---------------------------------------------------------------------------

/// A bidirectional async stream suitable for simulator communication.
///
/// [`TcpStream`] satisfies these bounds, as do in-memory duplex pipes, which
/// lets tests exercise [`Connection`] without a real socket.
pub trait SimulatorStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SimulatorStream for T {}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Endpoint and timeout settings for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Hostname or IP address of the simulator.
    pub host: String,
    /// TCP port of the simulator's control server.
    pub port: u16,
    /// Maximum time to wait for the TCP connection to be established.
    pub connect_timeout: Duration,
    /// Maximum time to wait for a single receive operation.
    pub read_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur on the transport layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// An operation was attempted without an active connection.
    #[error("not connected to simulator")]
    NotConnected,

    /// The TCP connection could not be established (refusal, DNS failure,
    /// or connect timeout).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer closed the stream before the declared byte count arrived.
    #[error("connection closed while receiving data ({received}/{expected} bytes)")]
    ShortRead { received: usize, expected: usize },

    /// The peer closed the stream in the middle of a line.
    #[error("connection closed mid-line")]
    TruncatedLine,

    /// The peer closed the stream before sending any response.
    #[error("no response received")]
    NoResponse,

    /// An I/O error occurred on the stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A receive operation exceeded the configured read timeout.
    #[error("receive timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A single TCP connection to the simulator's control server.
///
/// The connection is either `Disconnected` (no stream) or `Connected`; it is
/// created by an explicit [`connect`](Self::connect) and destroyed by an
/// explicit [`disconnect`](Self::disconnect) or by any receive-side failure.
/// There is no automatic reconnection: after a timeout or I/O error the
/// framing state of the stream is indeterminate (a late response would leave
/// stale bytes in the TCP buffer and desynchronize the next exchange), so the
/// stream is dropped and the caller must reconnect.
pub struct Connection {
    stream: Option<BufReader<Box<dyn SimulatorStream>>>,
    config: ConnectionConfig,
}

impl Connection {
    /// Create a new, disconnected connection targeting the configured endpoint.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            stream: None,
            config,
        }
    }

    /// Create a connection from a pre-connected stream.
    ///
    /// The connection is immediately usable; default timeouts apply.
    pub fn from_stream(stream: impl SimulatorStream + 'static) -> Self {
        Self {
            stream: Some(BufReader::new(Box::new(stream))),
            config: ConnectionConfig::default(),
        }
    }

    /// Establish the TCP connection, bounded by the configured connect timeout.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        debug!(%addr, "connecting to simulator");

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::ConnectionFailed(format!("connect to {addr} timed out")))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(BufReader::new(Box::new(stream) as Box<dyn SimulatorStream>));
        debug!("connected to simulator");
        Ok(())
    }

    /// Close the connection, if one is active. Idempotent.
    pub fn disconnect(&mut self) {
        self.stream.take();
    }

    /// Returns `true` if the connection currently holds an open stream.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Write `bytes` followed by a single `\n` terminator and flush.
    ///
    /// A failed or interrupted write leaves the stream unreliable, so the
    /// stream is dropped and the caller must reconnect.
    pub async fn send_line(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        trace!(line_bytes = bytes.len(), "writing line");

        let result = async {
            stream.write_all(bytes).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(io_err) = result {
            self.stream.take();
            return Err(TransportError::Io(io_err));
        }
        Ok(())
    }

    /// Read one line, excluding the `\n` terminator, with trailing ASCII
    /// whitespace trimmed.
    ///
    /// Returns an empty buffer on clean end-of-stream with no bytes read.
    /// Fails with [`TransportError::TruncatedLine`] if the peer closes
    /// mid-line, which also drops the stream.
    pub async fn recv_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let read_timeout = self.config.read_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let result = timeout(read_timeout, async {
            let mut line = Vec::new();
            let n = stream
                .read_until(b'\n', &mut line)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                // Clean end-of-stream before any byte of the line.
                return Ok(Vec::new());
            }
            if line.last() != Some(&b'\n') {
                return Err(TransportError::TruncatedLine);
            }
            line.pop();
            while line.last().is_some_and(|b| b.is_ascii_whitespace()) {
                line.pop();
            }
            Ok(line)
        })
        .await;

        match result {
            Ok(Ok(line)) => {
                trace!(line_bytes = line.len(), "read line");
                Ok(line)
            }
            Ok(Err(e)) => {
                self.stream.take();
                Err(e)
            }
            Err(_) => {
                self.stream.take();
                Err(TransportError::Timeout)
            }
        }
    }

    /// Read exactly `n` bytes, accumulating across short reads.
    ///
    /// Never returns fewer than `n` bytes: if the peer closes first the call
    /// fails with [`TransportError::ShortRead`] carrying the byte counts, and
    /// the stream is dropped.
    pub async fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let read_timeout = self.config.read_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        trace!(payload_bytes = n, "reading payload");

        let result = timeout(read_timeout, async {
            let mut buf = vec![0u8; n];
            let mut received = 0usize;
            while received < n {
                let read = stream
                    .read(&mut buf[received..])
                    .await
                    .map_err(TransportError::Io)?;
                if read == 0 {
                    return Err(TransportError::ShortRead {
                        received,
                        expected: n,
                    });
                }
                received += read;
            }
            Ok(buf)
        })
        .await;

        match result {
            Ok(Ok(buf)) => Ok(buf),
            Ok(Err(e)) => {
                self.stream.take();
                Err(e)
            }
            Err(_) => {
                self.stream.take();
                Err(TransportError::Timeout)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_disconnected_connection() {
        let conn = Connection::new(ConnectionConfig::default());
        assert!(!conn.is_connected());
    }

    #[test]
    fn from_stream_creates_connected_connection() {
        let (local, _remote) = tokio::io::duplex(1024);
        let conn = Connection::from_stream(local);
        assert!(conn.is_connected());
    }

    #[test]
    fn default_config_values() {
        let config = ConnectionConfig::default();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn send_line_appends_terminator() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let mut conn = Connection::from_stream(local);

        conn.send_line(br#"{"cmd":"screenshot"}"#).await.unwrap();

        let mut buf = vec![0u8; 21];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"{\"cmd\":\"screenshot\"}\n");
    }

    #[tokio::test]
    async fn send_line_fails_when_disconnected() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let result = conn.send_line(b"{}").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_line_strips_terminator_and_trailing_whitespace() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let mut conn = Connection::from_stream(local);

        remote.write_all(b"{\"status\":\"ok\"} \r\n").await.unwrap();

        let line = conn.recv_line().await.unwrap();
        assert_eq!(line, b"{\"status\":\"ok\"}");
    }

    #[tokio::test]
    async fn recv_line_empty_on_clean_end_of_stream() {
        let (local, remote) = tokio::io::duplex(1024);
        let mut conn = Connection::from_stream(local);

        drop(remote);

        let line = conn.recv_line().await.unwrap();
        assert!(line.is_empty());
    }

    #[tokio::test]
    async fn recv_line_fails_when_peer_closes_mid_line() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let mut conn = Connection::from_stream(local);

        remote.write_all(b"{\"status\":").await.unwrap();
        drop(remote);

        let result = conn.recv_line().await;
        assert!(matches!(result, Err(TransportError::TruncatedLine)));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn recv_exact_accumulates_fragmented_delivery() {
        let (local, mut remote) = tokio::io::duplex(8);
        let mut conn = Connection::from_stream(local);

        let payload: Vec<u8> = (0u8..=99).collect();
        let expected = payload.clone();
        tokio::spawn(async move {
            for fragment in payload.chunks(7) {
                remote.write_all(fragment).await.unwrap();
                remote.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let buf = conn.recv_exact(100).await.unwrap();
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn recv_exact_fails_on_short_delivery() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let mut conn = Connection::from_stream(local);

        remote.write_all(&[0u8; 40]).await.unwrap();
        drop(remote);

        let result = conn.recv_exact(100).await;
        match result {
            Err(TransportError::ShortRead { received, expected }) => {
                assert_eq!(received, 40);
                assert_eq!(expected, 100);
            }
            other => panic!("expected ShortRead, got: {other:?}"),
        }
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn recv_exact_times_out_and_drops_stream() {
        let (local, _remote) = tokio::io::duplex(1024);
        let mut conn = Connection::from_stream(local);
        conn.config.read_timeout = Duration::from_millis(50);

        let result = conn.recv_exact(10).await;
        assert!(matches!(result, Err(TransportError::Timeout)));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn connect_fails_when_nothing_listening() {
        let mut conn = Connection::new(ConnectionConfig {
            port: 19993,
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let result = conn.connect().await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (local, _remote) = tokio::io::duplex(64);
        let mut conn = Connection::from_stream(local);
        conn.disconnect();
        conn.disconnect();
        assert!(!conn.is_connected());
    }
}
