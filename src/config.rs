use serde::Deserialize;
use std::fs;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub interactions_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            interactions_path: "/interactions".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub application_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub register_commands: bool,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".into()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
    pub image_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("blueprints.json"),
            image_dir: PathBuf::from("assets/blueprints/images"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_embeds_per_period: u32,
    pub period_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_embeds_per_period: 4,
            period_seconds: 35,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: usize,
    pub idle_timeout_secs: u64,
    pub public_delete_after_secs: u64,
    pub reaper_interval_secs: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            idle_timeout_secs: 180,
            public_delete_after_secs: 90,
            reaper_interval_secs: 15,
        }
    }
}

impl PaginationConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn public_delete_after(&self) -> Duration {
        Duration::from_secs(self.public_delete_after_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub store_path: PathBuf,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("access.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enable: bool,
    pub bind_addr: String,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            bind_addr: "127.0.0.1:9100".into(),
            path: "/metrics".into(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path))?;

    parse_config(&config_content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .with_context(|| "Failed to parse configuration")?;

    Ok(config)
}
