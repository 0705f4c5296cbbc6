// ABOUTME: Gateway configuration loaded from environment variables
// ABOUTME: Every knob has a default so a bare container boots against compose services

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Log output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

/// What to do with a submit when the HLR does not answer in time.
/// `reject` is the only supported policy: the ESME gets ESME_RSYSERR and
/// no receipt is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    Reject,
}

/// Application settings, one field per environment variable
/// (SMPP_PORT -> smpp_port and so on).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // SMPP listener
    #[serde(default = "default_smpp_host")]
    pub smpp_host: String,
    #[serde(default = "default_smpp_port")]
    pub smpp_port: u16,
    #[serde(default = "default_smpp_system_id")]
    pub smpp_system_id: String,
    #[serde(default = "default_smpp_password")]
    pub smpp_password: String,

    // HLR provider
    #[serde(default = "default_hlr_api_key")]
    pub hlr_api_key: String,
    #[serde(default = "default_hlr_api_secret")]
    pub hlr_api_secret: String,
    #[serde(default = "default_hlr_base_url")]
    pub hlr_base_url: String,
    #[serde(default = "default_hlr_timeout_seconds")]
    pub hlr_timeout_seconds: f64,
    #[serde(default = "default_hlr_timeout_policy")]
    pub hlr_timeout_policy: TimeoutPolicy,
    #[serde(default = "default_hlr_cache_ttl_seconds")]
    pub hlr_cache_ttl_seconds: u64,
    #[serde(default = "default_hlr_max_concurrency")]
    pub hlr_max_concurrency: usize,

    // Redis cache
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_redis_max_connections")]
    pub redis_max_connections: u32,

    // PostgreSQL store
    #[serde(default = "default_db_enabled")]
    pub db_enabled: bool,
    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default = "default_db_password")]
    pub db_password: String,
    #[serde(default = "default_db_pool_min")]
    pub db_pool_min: u32,
    #[serde(default = "default_db_pool_max")]
    pub db_pool_max: u32,

    // Cache warmup
    #[serde(default = "default_cache_warmup_enabled")]
    pub cache_warmup_enabled: bool,
    #[serde(default = "default_cache_warmup_days")]
    pub cache_warmup_days: u32,
    #[serde(default = "default_cache_warmup_limit")]
    pub cache_warmup_limit: i64,

    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    // Metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    // Delivery receipts
    #[serde(default = "default_dlr_delay_seconds")]
    pub dlr_delay_seconds: f64,
}

fn default_smpp_host() -> String {
    "0.0.0.0".to_string()
}
fn default_smpp_port() -> u16 {
    2776
}
fn default_smpp_system_id() -> String {
    "testuser".to_string()
}
fn default_smpp_password() -> String {
    "testpass".to_string()
}
fn default_hlr_api_key() -> String {
    "MyApiKey".to_string()
}
fn default_hlr_api_secret() -> String {
    "MyApiSecret".to_string()
}
fn default_hlr_base_url() -> String {
    "https://api.tmtvelocity.com/live/json".to_string()
}
fn default_hlr_timeout_seconds() -> f64 {
    5.0
}
fn default_hlr_timeout_policy() -> TimeoutPolicy {
    TimeoutPolicy::Reject
}
fn default_hlr_cache_ttl_seconds() -> u64 {
    86_400
}
fn default_hlr_max_concurrency() -> usize {
    100
}
fn default_redis_url() -> String {
    "redis://redis:6379/0".to_string()
}
fn default_redis_max_connections() -> u32 {
    30
}
fn default_db_enabled() -> bool {
    true
}
fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_name() -> String {
    "smpp_hlr".to_string()
}
fn default_db_user() -> String {
    "smpp_user".to_string()
}
fn default_db_password() -> String {
    "password".to_string()
}
fn default_db_pool_min() -> u32 {
    5
}
fn default_db_pool_max() -> u32 {
    20
}
fn default_cache_warmup_enabled() -> bool {
    true
}
fn default_cache_warmup_days() -> u32 {
    7
}
fn default_cache_warmup_limit() -> i64 {
    100_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> LogFormat {
    LogFormat::Json
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_metrics_path() -> String {
    "/metrics".to_string()
}
fn default_dlr_delay_seconds() -> f64 {
    0.0
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn smpp_bind_addr(&self) -> String {
        format!("{}:{}", self.smpp_host, self.smpp_port)
    }

    pub fn metrics_bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.metrics_port)
    }

    pub fn db_connect_options(&self) -> sqlx::postgres::PgConnectOptions {
        sqlx::postgres::PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .database(&self.db_name)
            .username(&self.db_user)
            .password(&self.db_password)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smpp_host: default_smpp_host(),
            smpp_port: default_smpp_port(),
            smpp_system_id: default_smpp_system_id(),
            smpp_password: default_smpp_password(),
            hlr_api_key: default_hlr_api_key(),
            hlr_api_secret: default_hlr_api_secret(),
            hlr_base_url: default_hlr_base_url(),
            hlr_timeout_seconds: default_hlr_timeout_seconds(),
            hlr_timeout_policy: default_hlr_timeout_policy(),
            hlr_cache_ttl_seconds: default_hlr_cache_ttl_seconds(),
            hlr_max_concurrency: default_hlr_max_concurrency(),
            redis_url: default_redis_url(),
            redis_max_connections: default_redis_max_connections(),
            db_enabled: default_db_enabled(),
            db_host: default_db_host(),
            db_port: default_db_port(),
            db_name: default_db_name(),
            db_user: default_db_user(),
            db_password: default_db_password(),
            db_pool_min: default_db_pool_min(),
            db_pool_max: default_db_pool_max(),
            cache_warmup_enabled: default_cache_warmup_enabled(),
            cache_warmup_days: default_cache_warmup_days(),
            cache_warmup_limit: default_cache_warmup_limit(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_metrics_enabled(),
            metrics_port: default_metrics_port(),
            metrics_path: default_metrics_path(),
            dlr_delay_seconds: default_dlr_delay_seconds(),
        }
    }
}
