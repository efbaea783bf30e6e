use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub network: NetworkConfig,
    pub qr: QrConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to, e.g.
    /// `https://gym.example.com/api`.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QrConfig {
    /// How long a generated check-in code is shown before it expires.
    pub validity_secs: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            validity_secs: crate::qr_timer::DEFAULT_VALIDITY_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Where the login token is kept. Defaults to the user config directory.
    pub file: Option<PathBuf>,
}

impl SessionConfig {
    pub fn path(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| config_dir().join("session.json"))
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gym-portal")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let api_defaults = ApiConfig::default();
        let network_defaults = NetworkConfig::default();
        let qr_defaults = QrConfig::default();

        let mut builder = Config::builder()
            // 1. Load default values
            .set_default("api.base_url", api_defaults.base_url)?
            .set_default("network.request_timeout_secs", network_defaults.request_timeout_secs)?
            .set_default("network.connect_timeout_secs", network_defaults.connect_timeout_secs)?
            .set_default("qr.validity_secs", qr_defaults.validity_secs)?
            .set_default("session.file", None::<String>)?
            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir().join("config.toml")).required(false))
            // 4. Load from Environment variables (GYM_PORTAL__API__BASE_URL=...)
            .add_source(
                Environment::with_prefix("GYM_PORTAL")
                    .prefix_separator("__")
                    .separator("__"),
            );

        // The short form deployments already use for the API location.
        if let Ok(url) = std::env::var("GYM_API_URL") {
            builder = builder
                .set_override("api.base_url", url)
                .context("Failed to apply GYM_API_URL")?;
        }

        let s = builder.build().context("Failed to build configuration")?;
        let config: Self = s
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if config.api.base_url.trim().is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        Ok(config)
    }
}
