use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use std::time::Duration;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crate::error::Error;
use crate::scheduler::CronSchedule;
use crate::validation::{validate_api_key, validate_currency, validate_identifier, validate_symbol};

pub const API_KEY_ENV: &str = "CMC_API_KEY";
pub const WAREHOUSE_URL_ENV: &str = "WAREHOUSE_URL";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    pub warehouse: WarehouseConfig,
    pub transform: TransformConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Usually left empty in the file and supplied through `CMC_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_convert")]
    pub convert: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub create_table: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformConfig {
    #[serde(default = "default_dbt_bin")]
    pub dbt_bin: PathBuf,
    pub profiles_dir: PathBuf,
    pub project_dir: PathBuf,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub full_refresh: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_cron")]
    pub cron: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_base_url() -> String { "https://sandbox-api.coinmarketcap.com/v1".to_string() }
fn default_symbol() -> String { "BTC".to_string() }
fn default_convert() -> String { "USD".to_string() }
fn default_api_timeout() -> u64 { 10 }
fn default_schema() -> String { "public".to_string() }
fn default_table() -> String { "quote".to_string() }
fn default_max_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 30 }
fn default_true() -> bool { true }
fn default_dbt_bin() -> PathBuf { PathBuf::from("dbt") }
fn default_models() -> Vec<String> { vec!["quote".to_string()] }
fn default_cron() -> String { "*/5 * * * *".to_string() }
fn default_retry_delay() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            symbol: default_symbol(),
            convert: default_convert(),
            timeout_secs: default_api_timeout(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            start_date: None,
            retries: 0,
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl WarehouseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl TransformConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Config {
    /// Reads the TOML file, then applies environment overrides for secrets.
    /// The result is not validated; call [`Config::validate`] before use.
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.api.api_key = key;
        }
        if let Some(url) = lookup(WAREHOUSE_URL_ENV).filter(|v| !v.is_empty()) {
            self.warehouse.url = url;
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        validate_api_key(&self.api.api_key)?;
        validate_symbol(&self.api.symbol)?;
        validate_currency(&self.api.convert)?;
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(Error::ConfigError(format!("api.base_url must be an http(s) URL, got '{}'", self.api.base_url)));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigError("api.timeout_secs must be positive".to_string()));
        }

        if !self.warehouse.url.starts_with("postgres://") && !self.warehouse.url.starts_with("postgresql://") {
            return Err(Error::ConfigError("warehouse.url must be a postgres:// URL".to_string()));
        }
        validate_identifier(&self.warehouse.schema)?;
        validate_identifier(&self.warehouse.table)?;
        if self.warehouse.max_connections == 0 {
            return Err(Error::ConfigError("warehouse.max_connections must be positive".to_string()));
        }
        if self.warehouse.connect_timeout_secs == 0 {
            return Err(Error::ConfigError("warehouse.connect_timeout_secs must be positive".to_string()));
        }

        if self.transform.models.is_empty() {
            return Err(Error::ConfigError("transform.models must name at least one model".to_string()));
        }
        if self.transform.timeout_secs == Some(0) {
            return Err(Error::ConfigError("transform.timeout_secs must be positive".to_string()));
        }

        CronSchedule::parse(&self.schedule.cron)?;
        Ok(())
    }
}
