//! Configuration loading and discovery
//!
//! The monitor is configured through a single JSON file: which channels to
//! open, which DBC databases to load and which signals to watch. When no
//! file is given on the command line, the config directory is searched and
//! a single candidate is auto-selected.

use anyhow::{bail, Context, Result};
use can_monitor_core::config::SignalWatch;
use can_monitor_core::signals::SignalDatabase;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from a JSON file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Bus channels to open, in channel-index order
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    /// DBC files, loaded in listed order (matching priority)
    #[serde(default)]
    pub databases: Vec<PathBuf>,

    /// Watched signals; empty means "watch every database signal"
    #[serde(default)]
    pub signals: Vec<SignalWatch>,
}

/// One bus channel to capture from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Interface type; only "socketcan" is supported
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Interface name, e.g. "can0" or "vcan0"
    pub channel: String,

    /// Nominal bitrate in bit/s; informational, the interface must
    /// already be configured at the link level
    #[serde(default)]
    pub bitrate: Option<u32>,
}

fn default_interface() -> String {
    "socketcan".to_string()
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Auto-select the single JSON config file in a directory
///
/// Zero candidates or more than one is an error that names the directory
/// (and the candidates), so the user knows what to fix.
pub fn discover_config(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read config directory: {:?}", dir))?;

    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            candidates.push(path);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => bail!("No JSON config file found in {:?} (use --config)", dir),
        1 => Ok(candidates.remove(0)),
        _ => bail!(
            "Several config files found in {:?}: {:?} (use --config to pick one)",
            dir,
            candidates
        ),
    }
}

/// Drop duplicate watch entries, keeping the first occurrence
///
/// Two entries collide when they name the same signal with the same
/// message constraint; differing constraints are legitimate.
pub fn dedup_watches(watches: Vec<SignalWatch>) -> Vec<SignalWatch> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut result = Vec::new();

    for watch in watches {
        if seen.insert((watch.name.clone(), watch.message.clone())) {
            result.push(watch);
        } else {
            log::warn!(
                "Duplicate watch entry for signal '{}' ignored (first entry wins)",
                watch.name
            );
        }
    }
    result
}

/// Expand an empty watch list to one unconstrained watch per database signal
pub fn effective_watches(
    configured: Vec<SignalWatch>,
    database: &SignalDatabase,
) -> Vec<SignalWatch> {
    if !configured.is_empty() {
        return configured;
    }

    log::info!("No signals configured, watching every database signal");
    database
        .messages()
        .iter()
        .flat_map(|message| {
            let message_name = message.name.clone();
            message
                .signals
                .iter()
                .map(move |signal| SignalWatch::new(&signal.name).with_message(&message_name))
        })
        .collect()
}
