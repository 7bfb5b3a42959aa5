//! Application settings and configuration
//!
//! Settings come from environment variables (with `.env` support) and sensible
//! defaults, can be layered with an INI file, and are finally overridden by
//! command-line flags in `main`.

use crate::pipeline::BatchConfig;
use crate::utils::RetryConfig;
use anyhow::{Context, Result};
use clap::ValueEnum;
use config::{File, FileFormat, Map, Source, Value};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default public Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Largest media group the Bot API accepts
pub const MAX_GROUP_SIZE: usize = 10;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => anyhow::bail!("Invalid log format: {}. Expected: json or pretty", s),
        }
    }
}

/// Batching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchSettings {
    pub group_size: usize,
    pub start_index: u64,
    pub end_index: u64,
    pub cooldown_seconds: u64,
    pub progress_every: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            group_size: 4,
            start_index: 0,
            end_index: 0,
            cooldown_seconds: 3,
            progress_every: 10,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delay_seconds: u64,
    pub rate_limit_cooldown_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_seconds: 5,
            rate_limit_cooldown_seconds: 30,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,
    pub log_format: LogFormat,

    // Remote service
    pub api_urls: Vec<String>,
    #[serde(skip_serializing)]
    pub tokens: Vec<String>,
    pub chat_id: String,
    /// Per-request timeout; `None` keeps the transport default
    pub request_timeout_seconds: Option<u64>,

    // Pipeline
    pub batch: BatchSettings,
    pub retry: RetrySettings,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let settings = Self {
            app_name: env_or_default("APP_NAME", &defaults.app_name),
            app_version: defaults.app_version,
            log_level: env_or_default("LOG_LEVEL", "info"),
            log_format: env_or_default("LOG_FORMAT", "json")
                .parse()
                .unwrap_or_default(),

            api_urls: env::var("TG_API_URLS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.api_urls),
            tokens: env::var("TG_BOT_TOKENS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            chat_id: env::var("TG_CHAT_ID").unwrap_or_default(),
            request_timeout_seconds: match env::var("REQUEST_TIMEOUT_SECONDS") {
                Ok(v) => Some(v.parse().context("Invalid REQUEST_TIMEOUT_SECONDS value")?),
                Err(_) => None,
            },

            batch: BatchSettings {
                group_size: env_or_default("GROUP_SIZE", "4")
                    .parse()
                    .context("Invalid GROUP_SIZE value")?,
                start_index: env_or_default("START_INDEX", "0")
                    .parse()
                    .context("Invalid START_INDEX value")?,
                end_index: env_or_default("END_INDEX", "0")
                    .parse()
                    .context("Invalid END_INDEX value")?,
                cooldown_seconds: env_or_default("BATCH_COOLDOWN_SECONDS", "3")
                    .parse()
                    .unwrap_or(3),
                progress_every: env_or_default("PROGRESS_EVERY", "10")
                    .parse()
                    .unwrap_or(10),
            },

            retry: RetrySettings {
                max_retries: env_or_default("MAX_RETRIES", "3")
                    .parse()
                    .context("Invalid MAX_RETRIES value")?,
                delay_seconds: env_or_default("RETRY_DELAY_SECONDS", "5")
                    .parse()
                    .unwrap_or(5),
                rate_limit_cooldown_seconds: env_or_default("RATE_LIMIT_COOLDOWN_SECONDS", "30")
                    .parse()
                    .unwrap_or(30),
            },
        };

        Ok(settings)
    }

    /// Layer an INI configuration file over the current settings
    ///
    /// Mirror addresses from the file replace the current ones. Tokens from
    /// the file replace the current ones only when the file lists any.
    pub fn merge_config_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = ConfigFile::load(path)?;

        tracing::info!(
            api_urls = file.api_urls.len(),
            tokens = file.tokens.len(),
            "Loaded configuration file"
        );

        if !file.api_urls.is_empty() {
            self.api_urls = file.api_urls;
        }
        if !file.tokens.is_empty() {
            self.tokens = file.tokens;
        }
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.chat_id.trim().is_empty() {
            anyhow::bail!("A target chat id is required (--chat-id or TG_CHAT_ID)");
        }
        if self.tokens.iter().all(|t| t.trim().is_empty()) {
            anyhow::bail!("No bot token configured (--bot-token, TG_BOT_TOKENS or config file)");
        }
        if self.api_urls.iter().all(|u| u.trim().is_empty()) {
            anyhow::bail!("No API endpoint configured");
        }
        if self.batch.group_size == 0 || self.batch.group_size > MAX_GROUP_SIZE {
            anyhow::bail!(
                "group_size must be between 1 and {}, got {}",
                MAX_GROUP_SIZE,
                self.batch.group_size
            );
        }
        if self.batch.end_index != 0 && self.batch.end_index < self.batch.start_index {
            anyhow::bail!(
                "end_index ({}) must be 0 or at least start_index ({})",
                self.batch.end_index,
                self.batch.start_index
            );
        }
        if self.retry.max_retries == 0 {
            anyhow::bail!("max_retries must be at least 1");
        }
        if self.request_timeout_seconds == Some(0) {
            anyhow::bail!("request_timeout_seconds must be > 0");
        }
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            group_size: self.batch.group_size,
            start_index: self.batch.start_index,
            end_index: self.batch.end_index,
            cooldown: Duration::from_secs(self.batch.cooldown_seconds),
            progress_every: self.batch.progress_every,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.retry.max_retries)
            .with_delay(Duration::from_secs(self.retry.delay_seconds))
            .with_rate_limit_cooldown(Duration::from_secs(self.retry.rate_limit_cooldown_seconds))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "tg-batch-uploader".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            api_urls: vec![DEFAULT_API_URL.to_string()],
            tokens: Vec::new(),
            chat_id: String::new(),
            request_timeout_seconds: None,
            batch: BatchSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

// ============================================================================
// INI Configuration File
// ============================================================================

/// Contents of an INI configuration file
///
/// ```ini
/// [Telegram]
/// api_url = https://api.telegram.org, https://mirror.example.org
///
/// [Token1]
/// name = primary
/// token = 123456:ABC...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub api_urls: Vec<String>,
    /// Tokens of every `Token*` section, in the order the sections appear
    pub tokens: Vec<String>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .with_context(|| format!("Config path is not valid UTF-8: {}", path.display()))?;

        // Collected straight from the source so the section map keeps file order
        let sections: Map<String, Value> = File::new(path_str, FileFormat::Ini)
            .collect()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut api_urls = Vec::new();
        let mut tokens = Vec::new();

        for (section, value) in sections {
            let lower = section.to_lowercase();
            if lower == "telegram" {
                if let Some(raw) = section_value(value, "api_url")? {
                    api_urls = split_list(&raw);
                }
            } else if lower.starts_with("token") {
                match section_value(value, "token")? {
                    Some(token) if !token.trim().is_empty() => tokens.push(token.trim().to_string()),
                    _ => tracing::warn!(section = %section, "Token section without a token"),
                }
            }
        }

        Ok(Self { api_urls, tokens })
    }
}

/// Look up a key in an INI section, ignoring key case
fn section_value(section: Value, key: &str) -> Result<Option<String>> {
    let table = match section.into_table() {
        Ok(table) => table,
        // Top-level keys outside any section are not tables
        Err(_) => return Ok(None),
    };

    for (name, value) in table {
        if name.eq_ignore_ascii_case(key) {
            let value = value
                .into_string()
                .with_context(|| format!("Config key {} is not a string", key))?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
