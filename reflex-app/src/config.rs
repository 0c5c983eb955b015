use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reflex_experiment::TimerConfig;
use serde::Deserialize;

/// Settings loaded from `reflex.toml`, then overridden by flags
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// PocketBase base URL; the in-process leaderboard is used when unset
    pub leaderboard_url: Option<String>,
    pub ranking_size: u32,
    pub request_timeout_secs: u64,
    /// Appended to the built-in banned-word list
    pub banned_words: Vec<String>,
    pub timer: TimerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            leaderboard_url: None,
            ranking_size: 50,
            request_timeout_secs: 10,
            banned_words: Vec::new(),
            timer: TimerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw).context("invalid TOML config")?;
        cfg.timer.validate().context("invalid [timer] section")?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir).join("reflex");
    }
    if let Some(home) = std::env::var_os("HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(home).join(".local/share/reflex");
    }
    PathBuf::from("reflex-data")
}
