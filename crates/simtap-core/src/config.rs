//! Persistent configuration for simtap.
//!
//! Stores user settings in `~/.simtap/config.json`: the path to the
//! simulator binary so it does not have to be passed on every invocation,
//! and optional endpoint overrides for setups where the simulator listens
//! somewhere other than the default loopback port.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Directory holding simtap's persistent state (`~/.simtap`).
pub fn simtap_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".simtap")
}

/// Persistent simtap configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimtapConfig {
    /// Path to the simulator executable, recorded so lifecycle commands can
    /// skip the build-output probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulator_path: Option<PathBuf>,

    /// Override for the simulator host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Override for the simulator port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl SimtapConfig {
    /// Load config from `~/.simtap/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = simtap_dir().join(CONFIG_FILENAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.simtap/config.json`, creating the directory if
    /// needed.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = simtap_dir();
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(dir.join(CONFIG_FILENAME), json)
    }

    /// Path of the config file itself.
    pub fn path() -> PathBuf {
        simtap_dir().join(CONFIG_FILENAME)
    }
}
