//! TOML configuration with environment overrides.
//!
//! Every section is optional. With no file at all the engine uses the S3
//! backend in `us-east-1`, the default rule set, and reads the quarantine
//! bucket from the `BILLING_ERROR` environment variable.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::validate::{DEFAULT_CURRENCIES, DEFAULT_PRODUCT_LINES};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Root directory for the filesystem backend; one subdirectory per container.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            region: default_region(),
            endpoint_url: None,
            root: None,
        }
    }
}

fn default_backend() -> String {
    "s3".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuarantineConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    /// Environment variable that names the quarantine bucket. Wins over `bucket`.
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            env_var: default_env_var(),
        }
    }
}

fn default_env_var() -> String {
    "BILLING_ERROR".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    #[serde(default = "default_product_lines")]
    pub product_lines: Vec<String>,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            product_lines: default_product_lines(),
            currencies: default_currencies(),
        }
    }
}

fn default_product_lines() -> Vec<String> {
    DEFAULT_PRODUCT_LINES.iter().map(|s| s.to_string()).collect()
}
fn default_currencies() -> Vec<String> {
    DEFAULT_CURRENCIES.iter().map(|s| s.to_string()).collect()
}

impl QuarantineConfig {
    /// Resolve the quarantine bucket: environment first, then the config file.
    pub fn resolve_bucket(&self) -> Result<String> {
        let from_env = std::env::var(&self.env_var)
            .ok()
            .filter(|v| !v.trim().is_empty());
        match from_env.or_else(|| self.bucket.clone()) {
            Some(bucket) => Ok(bucket),
            None => bail!(
                "quarantine bucket not configured: set {} or [quarantine].bucket",
                self.env_var
            ),
        }
    }
}

/// Load a config file, or the defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate_config(config: &Config) -> Result<()> {
    match config.storage.backend.as_str() {
        "s3" => {}
        "filesystem" => {
            if config.storage.root.is_none() {
                bail!("storage.root must be set when backend is 'filesystem'");
            }
        }
        other => bail!(
            "Unknown storage backend: '{}'. Must be s3 or filesystem.",
            other
        ),
    }

    if config.rules.product_lines.is_empty() {
        bail!("rules.product_lines must not be empty");
    }
    if config.rules.currencies.is_empty() {
        bail!("rules.currencies must not be empty");
    }

    Ok(())
}
