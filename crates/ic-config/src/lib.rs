//! Item catalog configuration
//!
//! Configuration is read from a TOML file, then `IC_*` environment variables
//! are layered on top, then the result is validated. Every section has
//! defaults, so an empty file (or no file at all) yields a runnable config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use ic_common::LogFormat;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pool: PoolSettings,
    pub batch: BatchSettings,
    pub store: StoreSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Worker pool sizing. The pool is created once from these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub name: String,
    pub concurrency: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            name: "batch".to_string(),
            concurrency: 10,
        }
    }
}

/// Simulated per-item processing cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub processing_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            processing_delay_ms: 100,
            jitter_ms: 0,
        }
    }
}

impl BatchSettings {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Parse TOML text without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read a TOML file, apply `IC_*` overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`], with overrides taken from `lookup`
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");

        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IC_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("IC_PORT") {
            self.server.port = parse_env("IC_PORT", &v)?;
        }
        if let Some(v) = lookup("IC_POOL_CONCURRENCY") {
            self.pool.concurrency = parse_env("IC_POOL_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("IC_PROCESSING_DELAY_MS") {
            self.batch.processing_delay_ms = parse_env("IC_PROCESSING_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("IC_JITTER_MS") {
            self.batch.jitter_ms = parse_env("IC_JITTER_MS", &v)?;
        }
        if let Some(v) = lookup("IC_STORE_BACKEND") {
            self.store.backend = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "IC_STORE_BACKEND".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("IC_STORE_URL") {
            self.store.url = Some(v);
        }
        if let Some(v) = lookup("IC_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("IC_LOG_FORMAT") {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "IC_LOG_FORMAT".to_string(),
                        value: v,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }
        if self.pool.concurrency == 0 {
            return Err(ConfigError::Invalid("pool.concurrency must be at least 1".to_string()));
        }
        if self.pool.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pool.name must not be blank".to_string()));
        }
        match self.store.backend {
            StoreBackend::Memory => {}
            StoreBackend::Sqlite | StoreBackend::Postgres => {
                if self.store.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                    return Err(ConfigError::Invalid(format!(
                        "store.url is required for the {:?} backend",
                        self.store.backend
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
