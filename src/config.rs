//! Inference service configuration

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "TUMOR_CONFIG";
pub const MODEL_PATH_ENV: &str = "TUMOR_MODEL_PATH";
pub const SCALER_PATH_ENV: &str = "TUMOR_SCALER_PATH";
pub const ALLOWED_ORIGINS_ENV: &str = "TUMOR_ALLOWED_ORIGINS";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub cors: CorsConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub model: PathBuf,
    pub scaler: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject request bodies carrying keys outside the feature table
    pub reject_unknown_fields: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.logging.level()?;
        Ok(config)
    }

    /// Config file path, honouring `TUMOR_CONFIG`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply the artifact path and CORS origin overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(MODEL_PATH_ENV).filter(|v| !v.is_empty()) {
            self.artifacts.model = PathBuf::from(path);
        }
        if let Some(path) = lookup(SCALER_PATH_ENV).filter(|v| !v.is_empty()) {
            self.artifacts.scaler = PathBuf::from(path);
        }
        if let Some(origins) = lookup(ALLOWED_ORIGINS_ENV) {
            let origins: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if !origins.is_empty() {
                self.cors.allowed_origins = origins;
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            body_limit_bytes: 64 * 1024,
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/model.json"),
            scaler: PathBuf::from("models/scaler.json"),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    /// Parsed `level`; matching is case-insensitive
    pub fn level(&self) -> anyhow::Result<Level> {
        Level::from_str(self.level.trim())
            .map_err(|_| anyhow::anyhow!("invalid logging.level '{}'", self.level))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
