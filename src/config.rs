//! Configuration file handling and the per-invocation [`Context`]
//!
//! Settings are resolved once at startup, lowest precedence first:
//!
//! - the YAML config file (`$CONSOLECTL_CONFIG_DIR/config.yaml`, or
//!   `consolectl/config.yaml` under the user config directory)
//! - `CONSOLECTL_API_KEY` / `CONSOLECTL_BASE_URL`
//! - command-line overrides
//!
//! The resulting [`Context`] is passed by reference to every handler.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context as _, Result};
use dirs::config_dir;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://console.example.com";
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// On-disk configuration; every key is optional
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
}

/// Values supplied on the command line for this invocation
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub page_size: Option<i64>,
    pub timeout_ms: Option<u64>,
}

/// Effective settings for one run
#[derive(Debug, Clone)]
pub struct Context {
    pub api_key: String,
    pub base_url: Url,
    pub page_size: i64,
    pub timeout: Duration,
}

impl Context {
    /// Loads the config file and applies environment and flag overrides
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        let file = load(&config_path()?)?;
        Self::from_parts(file, env_overrides(), overrides)
    }

    /// Merges the three layers; later layers win
    pub fn from_parts(file: Config, env: Config, overrides: Overrides) -> Result<Self> {
        let api_key = overrides
            .api_key
            .or(env.api_key)
            .or(file.api_key)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let base_url = overrides
            .base_url
            .or(env.base_url)
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_url)?;

        let page_size = overrides
            .page_size
            .or(env.page_size)
            .or(file.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Self {
            api_key,
            base_url,
            page_size,
            timeout: Duration::from_millis(overrides.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        })
    }

    /// Printable view with the API key masked
    pub fn masked(&self) -> serde_json::Value {
        serde_json::json!({
            "api_key": mask(&self.api_key),
            "base_url": self.base_url.as_str(),
            "page_size": self.page_size,
            "timeout_ms": self.timeout.as_millis() as u64,
        })
    }
}

/// API root with a trailing slash so relative joins keep the path prefix
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))
}

fn env_overrides() -> Config {
    Config {
        api_key: env::var("CONSOLECTL_API_KEY").ok(),
        base_url: env::var("CONSOLECTL_BASE_URL").ok(),
        page_size: None,
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(custom) = env::var("CONSOLECTL_CONFIG_DIR") {
        return Ok(PathBuf::from(custom).join("config.yaml"));
    }
    let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
    Ok(base.join("consolectl").join("config.yaml"))
}

/// Reads `path`, returning an empty config when it does not exist
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(config)
}

/// Merges `update` into the config at `path` and writes it back
pub fn save(path: &Path, update: Config) -> Result<Config> {
    let current = load(path)?;
    let merged = Config {
        api_key: update.api_key.or(current.api_key),
        base_url: update.base_url.or(current.base_url),
        page_size: update.page_size.or(current.page_size),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(&merged).context("serializing config")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(merged)
}
