//! Configuration for the Tessera CLI
//!
//! Read from `~/.tessera/config.toml` (or `$TESSERA_HOME/config.toml`). Every
//! key is optional and a missing file means defaults:
//!
//! ```toml
//! [progress]
//! refresh_interval_ms = 250
//! backoff_ms = 5
//!
//! [log]
//! filter = "tessera=debug"
//! ```

use super::Session;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tessera_logging::{logs_dir, tessera_home};
use tessera_worker::progress::{DEFAULT_BACKOFF, DEFAULT_REFRESH_INTERVAL};
use tessera_worker::ProgressSettings;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    pub progress: ProgressConfig,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub refresh_interval_ms: u64,
    pub backoff_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL.as_millis() as u64,
            backoff_ms: DEFAULT_BACKOFF.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// tracing filter directive; `RUST_LOG` takes precedence
    pub filter: Option<String>,
}

impl TesseraConfig {
    pub fn progress_settings(&self) -> ProgressSettings {
        ProgressSettings {
            refresh_interval: Duration::from_millis(self.progress.refresh_interval_ms),
            backoff: Duration::from_millis(self.progress.backoff_ms),
        }
    }
}

/// Get the config file path: ~/.tessera/config.toml
pub fn config_path() -> PathBuf {
    tessera_home().join("config.toml")
}

pub fn load() -> Result<TesseraConfig> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<TesseraConfig> {
    if !path.exists() {
        return Ok(TesseraConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Run the config command - shows resolved paths and settings
pub fn run(session: &Session) -> Result<ExitCode> {
    let home = tessera_home();
    let path = config_path();
    let logs = logs_dir();

    if session.json {
        super::print_json(&serde_json::json!({
            "home": home.to_string_lossy(),
            "config_file": {
                "path": path.to_string_lossy(),
                "exists": path.exists(),
            },
            "logs": logs.to_string_lossy(),
            "settings": session.config,
        }))?;
    } else {
        println!("TESSERA CONFIGURATION");
        println!("=====================");
        println!();
        println!("Home:     {}", home.display());
        println!(
            "Config:   {} ({})",
            path.display(),
            if path.exists() { "exists" } else { "not found, using defaults" }
        );
        println!("Logs:     {}", logs.display());
        println!();
        println!(
            "Progress: refresh every {} ms, backoff {} ms",
            session.config.progress.refresh_interval_ms, session.config.progress.backoff_ms
        );
        println!(
            "Log filter: {}",
            session.config.log.filter.as_deref().unwrap_or("(default)")
        );
    }

    Ok(ExitCode::SUCCESS)
}
