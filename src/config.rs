//! Centralized runtime constants and the chat client configuration file.
//!
//! All tunable intervals, thresholds, and counts are collected here so they can
//! be found and adjusted in a single place rather than scattered across modules.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Width of one traffic measurement window (seconds).
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Number of measurement windows averaged into a baseline.
pub const DEFAULT_SAMPLE_COUNT: u32 = 10;

/// A rate above `baseline * DEFAULT_THRESHOLD_MULTIPLIER` is an anomaly.
pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 15.0;

/// Default baseline file, relative to the working directory.
pub const BASELINE_FILE_NAME: &str = "red.txt";

/// Default chat client configuration file, relative to the working directory.
pub const CLIENT_CONFIG_FILE_NAME: &str = "client_config.json";

/// Size of the buffer handed to each socket read in the receive task (bytes).
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Where the chat client connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5000,
        }
    }
}

/// Load the client configuration. Both fields are required.
pub fn load_client_config(path: &Path) -> Result<ClientConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read client config: {}", path.display()))?;
    let cfg: ClientConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse client config: {}", path.display()))?;
    if cfg.server_host.trim().is_empty() {
        anyhow::bail!("'server_host' is empty in {}", path.display());
    }
    Ok(cfg)
}

pub fn save_client_config(path: &Path, cfg: &ClientConfig, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(cfg).context("failed to serialize client config")?;
    fs::write(path, raw).with_context(|| format!("failed to write config: {}", path.display()))?;
    Ok(())
}
