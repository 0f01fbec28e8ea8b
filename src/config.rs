//! Daemon configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `STUDIOD_*`
//! environment variables. The binary's CLI flags override the result.

use std::net::SocketAddr;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default configuration file path
pub const DEFAULT_CONFIG_FILE: &str = "studiod.toml";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// SQLite database path (in-memory when unset)
    pub database: Option<String>,
    /// Hosted image model settings
    pub model: ModelConfig,
}

/// Hosted image model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key; `GEMINI_API_KEY` is honored when unset
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Image model identifier
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            database: None, // None = in-memory
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-image".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the given TOML file (if present) and the
    /// environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.unwrap_or(DEFAULT_CONFIG_FILE)))
            .merge(Env::prefixed("STUDIOD_").split("__"))
            .extract()?;

        // Conventional key variable, same as the hosted API's own tooling
        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("GEMINI_API_KEY").ok();
        }

        Ok(config)
    }
}
