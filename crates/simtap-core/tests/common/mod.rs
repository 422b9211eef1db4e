//! Shared test helpers for simtap-core integration tests.
//!
//! Provides a mock simulator that speaks the JSON-line control protocol over
//! a real TCP socket: for each scripted exchange it reads one request line,
//! replies with a canned response line, and optionally streams a raw binary
//! payload after it, fragmented or truncated as the test demands.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use simtap_core::client::SimulatorClient;
use simtap_core::connection::ConnectionConfig;

/// One scripted request/response exchange.
pub struct Exchange {
    line: String,
    payload: Vec<u8>,
    fragment: Option<usize>,
    close_after: Option<usize>,
    no_reply: bool,
}

impl Exchange {
    /// Reply with a bare response line.
    pub fn line(line: &str) -> Self {
        Self {
            line: line.to_string(),
            payload: Vec::new(),
            fragment: None,
            close_after: None,
            no_reply: false,
        }
    }

    /// Read the request, then drop the connection without replying.
    pub fn no_reply() -> Self {
        Self {
            no_reply: true,
            ..Self::line("")
        }
    }

    /// Reply with a response line followed by a raw payload.
    pub fn with_payload(line: &str, payload: Vec<u8>) -> Self {
        Self {
            payload,
            ..Self::line(line)
        }
    }

    /// Deliver the payload in fragments of `n` bytes.
    pub fn fragmented(mut self, n: usize) -> Self {
        self.fragment = Some(n);
        self
    }

    /// Drop the connection after `n` payload bytes.
    pub fn close_after(mut self, n: usize) -> Self {
        self.close_after = Some(n);
        self
    }
}

/// Start a mock simulator that accepts one connection and plays through the
/// scripted exchanges, then keeps the connection open until the client side
/// drops it.
pub async fn mock_simulator(exchanges: Vec<Exchange>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);

        for exchange in exchanges {
            // Read one request line.
            let mut request = String::new();
            if stream.read_line(&mut request).await.unwrap() == 0 {
                return;
            }

            if exchange.no_reply {
                return;
            }

            // Send the canned response line.
            stream.write_all(exchange.line.as_bytes()).await.unwrap();
            stream.write_all(b"\n").await.unwrap();
            stream.flush().await.unwrap();

            // Send the payload, honoring truncation and fragmentation.
            let payload = match exchange.close_after {
                Some(n) => &exchange.payload[..n],
                None => &exchange.payload[..],
            };
            match exchange.fragment {
                Some(size) => {
                    for fragment in payload.chunks(size) {
                        stream.write_all(fragment).await.unwrap();
                        stream.flush().await.unwrap();
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                }
                None => {
                    stream.write_all(payload).await.unwrap();
                    stream.flush().await.unwrap();
                }
            }

            if exchange.close_after.is_some() {
                return;
            }
        }

        // Hold the socket open; reading detects the client's disconnect.
        let mut rest = String::new();
        let _ = stream.read_line(&mut rest).await;
    });

    addr
}

/// Convenience: connect a client to a mock simulator scripted with the given
/// exchanges.
pub async fn connected_client(exchanges: Vec<Exchange>) -> SimulatorClient {
    let addr = mock_simulator(exchanges).await;
    let mut client = SimulatorClient::new(ConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
    });
    client.connect().await.unwrap();
    client
}
