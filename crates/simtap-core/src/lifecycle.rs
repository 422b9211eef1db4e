//! Lifecycle management for the simulator process.
//!
//! This module handles locating, launching, health-checking, and stopping
//! the simulator binary whose control server the client drives. It is a
//! companion to the protocol core, not part of it: the client never depends
//! on how the simulator was started, only that it accepts the protocol on
//! the configured port once initialized.
//!
//! [`SimulatorLifecycle`] orchestrates the startup sequence:
//!
//! 1. **Locate** the executable (explicit path, or probe the usual
//!    build-output locations)
//! 2. **Spawn** the process, forcing dummy SDL drivers when headless
//! 3. **Wait for ready** by polling the TCP port with a no-op `wait` command
//! 4. **Retry** on failure (kill + respawn) up to a configurable limit
//!
//! # Example
//!
//! ```no_run
//! use simtap_core::lifecycle::{LifecycleConfig, SimulatorLifecycle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut lifecycle = SimulatorLifecycle::new(LifecycleConfig::default());
//! lifecycle.ensure_running().await?;
//! // ... drive the simulator ...
//! lifecycle.stop();
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::client::SimulatorClient;
use crate::connection::{ConnectionConfig, DEFAULT_HOST, DEFAULT_PORT};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File name of the simulator binary produced by its build.
pub const SIMULATOR_BINARY: &str = "lvgl-watch-sim";

/// Environment switch that forces headless rendering in the spawned
/// simulator.
pub const HEADLESS_ENV: &str = "SIMTAP_HEADLESS";

/// Relative build-output locations probed by
/// [`SimulatorLifecycle::find_executable`].
const SEARCH_DIRS: &[&str] = &[
    "build",
    "build/Release",
    "build/Debug",
    "../build",
    "../build/Release",
    "../build/Debug",
    "../../build",
    ".",
];

/// Poll interval while waiting for the simulator to accept commands.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the simulator lifecycle manager.
pub struct LifecycleConfig {
    /// Explicit path to the simulator executable. When `None`, the usual
    /// build-output locations are probed.
    pub executable: Option<PathBuf>,
    /// Run without opening a window (SDL dummy video/audio drivers).
    pub headless: bool,
    /// Host the simulator's control server will listen on.
    pub host: String,
    /// Port the simulator's control server will listen on.
    pub port: u16,
    /// Maximum time to wait for the simulator to become ready.
    pub startup_timeout: Duration,
    /// Maximum number of respawn retries before giving up.
    pub max_retries: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: std::env::var(HEADLESS_ENV).is_ok_and(|v| v == "1"),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            startup_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors specific to simulator lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// No executable at the configured path, or the probe found nothing.
    #[error("simulator executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    /// The process could not be spawned.
    #[error("failed to spawn simulator: {0}")]
    SpawnFailed(String),

    /// The process exited before its control server became reachable.
    #[error("simulator exited during startup ({0})")]
    ExitedEarly(String),

    /// The simulator did not accept commands within the startup timeout.
    #[error("simulator did not become ready within timeout")]
    StartupTimeout,

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// SimulatorLifecycle
// ---------------------------------------------------------------------------

/// Manages the simulator process from spawn to termination.
///
/// Dropping the manager kills a still-attached child; call
/// [`detach`](Self::detach) to leave the simulator running past the
/// manager's lifetime.
pub struct SimulatorLifecycle {
    config: LifecycleConfig,
    child: Option<Child>,
}

impl SimulatorLifecycle {
    /// Create a new lifecycle manager. No process is spawned until
    /// [`start`](Self::start) is called.
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    /// Probe the usual build-output locations for the simulator binary.
    pub fn find_executable() -> Option<PathBuf> {
        for dir in SEARCH_DIRS {
            for name in [
                SIMULATOR_BINARY.to_string(),
                format!("{SIMULATOR_BINARY}.exe"),
            ] {
                let candidate = Path::new(dir).join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn executable(&self) -> Result<PathBuf, LifecycleError> {
        if let Some(path) = &self.config.executable {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(LifecycleError::ExecutableNotFound(path.clone()));
        }
        Self::find_executable()
            .ok_or_else(|| LifecycleError::ExecutableNotFound(PathBuf::from(SIMULATOR_BINARY)))
    }

    /// Spawn the simulator process. Succeeds silently if it is already
    /// running.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if self.is_running() {
            return Ok(());
        }

        let path = self.executable()?;
        let mut command = Command::new(&path);
        if self.config.headless {
            // Dummy SDL drivers keep the simulator from opening a window or
            // touching the audio device.
            command
                .env("SDL_VIDEODRIVER", "dummy")
                .env("SDL_AUDIODRIVER", "dummy");
        }

        let child = command
            .spawn()
            .map_err(|e| LifecycleError::SpawnFailed(format!("{}: {e}", path.display())))?;
        debug!(pid = child.id(), path = %path.display(), "simulator spawned");
        self.child = Some(child);
        Ok(())
    }

    /// Wait for the simulator's control server to accept commands.
    ///
    /// Connects and round-trips a 1 ms `wait` command every 500 ms until a
    /// success or [`LifecycleConfig::startup_timeout`] is exceeded. Fails
    /// fast with [`LifecycleError::ExitedEarly`] if the spawned process
    /// terminates first.
    pub async fn wait_for_ready(&mut self) -> Result<(), LifecycleError> {
        let deadline = tokio::time::Instant::now() + self.config.startup_timeout;
        let config = ConnectionConfig {
            host: self.config.host.clone(),
            port: self.config.port,
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
        };

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.child = None;
                    return Err(LifecycleError::ExitedEarly(status.to_string()));
                }
            }

            let mut client = SimulatorClient::new(config.clone());
            if client.connect().await.is_ok() {
                if client.wait(1).await {
                    client.disconnect();
                    debug!("simulator ready");
                    return Ok(());
                }
                client.disconnect();
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LifecycleError::StartupTimeout);
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Orchestrate the full startup: spawn and wait for ready, killing and
    /// respawning on timeout up to [`LifecycleConfig::max_retries`] times.
    pub async fn ensure_running(&mut self) -> Result<(), LifecycleError> {
        self.start()?;

        for attempt in 0..=self.config.max_retries {
            match self.wait_for_ready().await {
                Ok(()) => return Ok(()),
                Err(LifecycleError::StartupTimeout) if attempt < self.config.max_retries => {
                    warn!(attempt, "simulator not ready, respawning");
                    self.stop();
                    self.start()?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(LifecycleError::StartupTimeout)
    }

    /// Kill and reap the simulator process, if attached. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("simulator stopped");
        }
    }

    /// Release the child handle without killing the process, leaving the
    /// simulator running past this manager's lifetime.
    pub fn detach(&mut self) {
        if let Some(child) = self.child.take() {
            debug!(pid = child.id(), "simulator detached");
        }
    }

    /// Returns `true` if a spawned simulator process is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Drop for SimulatorLifecycle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
