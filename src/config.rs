//! Configuration System
//!
//! Hierarchical configuration loading from:
//! - quarry.toml (base configuration)
//! - quarry.local.toml (git-ignored local overrides)
//! - Environment variables (QUARRY_* prefix)
//!
//! ```toml
//! # quarry.toml
//! [providers]
//! providers_file = "/home/me/.quarry/providers.txt"
//! hello_timeout_secs = 10
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! QUARRY_PROVIDERS__PROVIDERS_FILE=/custom/providers.txt
//! QUARRY_LOGGING__LEVEL=trace
//! ```
//!
//! The providers file itself is plain text: one provider URL per line,
//! blank lines and `#` comments ignored.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider population configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// User-level list of provider URLs, one per line
    #[serde(default = "default_providers_file")]
    pub providers_file: PathBuf,

    /// Timeout for capability (`hello`) calls, seconds
    #[serde(default = "default_hello_timeout")]
    pub hello_timeout_secs: u64,

    /// Timeout for bulk and lazy data calls, seconds
    #[serde(default = "default_data_timeout")]
    pub data_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_providers_file() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".quarry").join("providers.txt")
}

fn default_hello_timeout() -> u64 {
    10
}

fn default_data_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            providers_file: default_providers_file(),
            hello_timeout_secs: default_hello_timeout(),
            data_timeout_secs: default_data_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            providers: ProvidersConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. quarry.toml (base configuration)
    /// 2. quarry.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (QUARRY_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("quarry.toml"))
            .merge(Toml::file("quarry.local.toml"))
            .merge(Env::prefixed("QUARRY_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("QUARRY_").split("__"))
            .extract()
    }
}

/// Read the providers file: one URL per line, `#` comments and blank lines
/// ignored.
pub fn read_provider_urls(path: &Path) -> io::Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let mut urls = Vec::new();
    for line in io::BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        urls.push(line.to_string());
    }
    Ok(urls)
}

/// Install a global tracing subscriber per the logging configuration.
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(error) = result {
        tracing::debug!(%error, "subscriber already installed");
    }
}
