use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fetcher::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Loss-detection and backfill thresholds. These are heuristics tuned over
/// the life of the tool, kept configurable rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_min_plausible_round")]
    pub min_plausible_round: u32,
    #[serde(default = "default_backfill_window")]
    pub backfill_window: u32,
    #[serde(default = "default_backfill_delay_ms")]
    pub backfill_delay_ms: u64,
    #[serde(default = "default_loss_warning_margin")]
    pub loss_warning_margin: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_path: Option<String>,
    pub api_url: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/dhlotto-sync/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_path) = overrides.data_path {
            self.storage.data_path = data_path;
        }
        if let Some(api_url) = overrides.api_url {
            self.source.api_url = api_url;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_data_path(&self) -> PathBuf {
        expand_tilde(&self.storage.data_path)
    }

    pub fn resolved_backup_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.backup_dir)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
data_path = "~/.local/share/dhlotto-sync/lotto-data.json"
backup_dir = "~/.local/share/dhlotto-sync/backups"

[source]
api_url = "https://www.dhlottery.co.kr/common.do"
timeout_secs = 12

[recovery]
min_plausible_round = 1100
backfill_window = 10
backfill_delay_ms = 1500
loss_warning_margin = 5
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            backup_dir: default_backup_dir(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            min_plausible_round: default_min_plausible_round(),
            backfill_window: default_backfill_window(),
            backfill_delay_ms: default_backfill_delay_ms(),
            loss_warning_margin: default_loss_warning_margin(),
        }
    }
}

fn default_data_path() -> String {
    "~/.local/share/dhlotto-sync/lotto-data.json".to_string()
}

fn default_backup_dir() -> String {
    "~/.local/share/dhlotto-sync/backups".to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_min_plausible_round() -> u32 {
    1100
}

fn default_backfill_window() -> u32 {
    10
}

fn default_backfill_delay_ms() -> u64 {
    1500
}

fn default_loss_warning_margin() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.recovery.min_plausible_round, 1100);
        assert_eq!(parsed.recovery.backfill_window, 10);
        assert_eq!(parsed.recovery.backfill_delay_ms, 1500);
        assert_eq!(parsed.recovery.loss_warning_margin, 5);
        assert_eq!(parsed.source.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[recovery]
backfill_window = 3
"#,
        )
        .unwrap();
        assert_eq!(parsed.recovery.backfill_window, 3);
        assert_eq!(parsed.recovery.backfill_delay_ms, 1500);
        assert_eq!(parsed.storage.data_path, default_data_path());
    }

    #[test]
    fn overrides_replace_configured_paths() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            data_path: Some("./data/lotto-data.json".to_string()),
            api_url: None,
        });
        assert_eq!(config.storage.data_path, "./data/lotto-data.json");
        assert_eq!(config.source.api_url, DEFAULT_API_URL);
    }
}
