//! # simtap-core
//!
//! Core library for driving an LVGL smartwatch simulator over TCP.
//!
//! The simulator exposes a line-oriented JSON control protocol with an
//! embedded raw binary payload for screenshots. This crate provides the
//! transport, codec, screenshot decoding pipeline, a script-friendly client
//! façade, and a lifecycle manager for the simulator process itself.
//!
//! ## Modules
//!
//! - [`connection`] - TCP transport with line and exact-count receive primitives
//! - [`protocol`] - Command/response types and the JSON-line codec
//! - [`screenshot`] - Raw framebuffer and legacy image payload decoding
//! - [`client`] - The [`client::SimulatorClient`] façade, one method per command
//! - [`lifecycle`] - Spawning, readiness polling, and termination of the simulator
//! - [`config`] - Persistent settings in `~/.simtap/config.json`
//!
//! ## Example
//!
//! ```no_run
//! use simtap_core::client::SimulatorClient;
//! use simtap_core::connection::ConnectionConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SimulatorClient::new(ConnectionConfig::default());
//! client.connect().await?;
//!
//! client.click("btn_heart").await;
//! client.wait(500).await;
//!
//! if let Some(bpm) = client.get_state("lbl_bpm").await {
//!     println!("heart rate: {bpm}");
//! }
//!
//! client.screenshot(Some("watchface.png".as_ref())).await;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod lifecycle;
pub mod protocol;
pub mod screenshot;
