use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scriptsync::WorkspaceOptions;
use scriptsync_core::ClientConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub api: ClientConfig,
    #[serde(default)]
    pub workspace: WorkspaceOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period before a burst of change notifications is printed
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
        }
    }
}

impl CliConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: CliConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::metadata(path).await.is_err() {
            return Ok(Self::default());
        }
        Self::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if self.workspace.extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("Workspace extension cannot be empty");
        }
        if self.workspace.state_dir.is_empty() || self.workspace.state_dir.contains(['/', '\\']) {
            anyhow::bail!("State directory must be a single folder name: {:?}", self.workspace.state_dir);
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Unknown log level: {}", other),
        }

        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriptsync")
            .join("config.toml")
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_debounce() -> Duration { Duration::from_millis(250) }
