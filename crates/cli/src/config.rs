//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use whiff_domain::usecases::ExportConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub export: ExportSection,

    #[serde(default)]
    pub mastodon: MastodonConfig,

    #[serde(default)]
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding the saved display settings
    #[serde(default = "default_settings_dir")]
    pub settings_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default = "default_render_debounce_ms")]
    pub render_debounce_ms: u64,

    #[serde(default = "default_placeholder_width")]
    pub placeholder_width: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    /// Environment variable holding an access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_settings_dir() -> PathBuf {
    PathBuf::from("./.whiff")
}

fn default_render_debounce_ms() -> u64 {
    10
}

fn default_placeholder_width() -> u32 {
    10
}

fn default_token_env() -> String {
    "WHIFF_TOKEN".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            settings_dir: default_settings_dir(),
        }
    }
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            render_debounce_ms: default_render_debounce_ms(),
            placeholder_width: default_placeholder_width(),
        }
    }
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

impl ExportSection {
    pub fn to_export_config(&self) -> ExportConfig {
        ExportConfig {
            render_debounce: Duration::from_millis(self.render_debounce_ms),
            placeholder_width: self.placeholder_width.max(1),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let default_path = PathBuf::from("./whiff.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WHIFF")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> Result<String> {
        let body = toml::to_string_pretty(&AppConfig::default())
            .context("Failed to serialize example configuration")?;

        Ok(format!(
            "# whiff configuration\n\
             #\n\
             # Any key can be overridden from the environment, e.g.\n\
             # WHIFF__MASTODON__TIMEOUT_SECS=10\n\
             #\n\
             # Set the variable named by mastodon.token_env to an access token\n\
             # to export posts that need a login.\n\n{}",
            body
        ))
    }
}
