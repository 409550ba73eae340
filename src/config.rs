//! Layered configuration loading: platform defaults → optional TOML file →
//! environment variable overrides → validation.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

const ENV_PREFIX: &str = "WIFI_INGEST_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            delivery: DeliveryConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

/// Message bus connection and batch-pull settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub topic: String,
    pub consumer_group: String,
    pub bootstrap_servers: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    150
}

fn default_batch_timeout_ms() -> u64 {
    5_000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            consumer_group: String::new(),
            bootstrap_servers: String::new(),
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
        }
    }
}

/// Recognized options from the delivery-stream option table, plus connection fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub delivery_stream_name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_batch_size_bytes")]
    pub max_batch_size_bytes: usize,
    #[serde(default = "default_max_record_size_bytes")]
    pub max_record_size_bytes: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_slow_batch_threshold_ms")]
    pub slow_batch_threshold_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_max_batch_size() -> usize {
    500
}
fn default_max_batch_size_bytes() -> usize {
    4 * 1024 * 1024
}
fn default_max_record_size_bytes() -> usize {
    1_024_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1_000
}
fn default_slow_batch_threshold_ms() -> u64 {
    1_200
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            delivery_stream_name: String::new(),
            region: None,
            endpoint_override: None,
            max_batch_size: default_max_batch_size(),
            max_batch_size_bytes: default_max_batch_size_bytes(),
            max_record_size_bytes: default_max_record_size_bytes(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            slow_batch_threshold_ms: default_slow_batch_threshold_ms(),
        }
    }
}

/// Readiness tolerance windows, consumed by the health arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_liveness_timeout_minutes")]
    pub liveness_timeout_minutes: u64,
    #[serde(default = "default_consumption_timeout_minutes")]
    pub consumption_timeout_minutes: u64,
    #[serde(default = "default_minimum_consumption_rate")]
    pub minimum_consumption_rate: f64,
}

fn default_liveness_timeout_minutes() -> u64 {
    2
}
fn default_consumption_timeout_minutes() -> u64 {
    5
}
fn default_minimum_consumption_rate() -> f64 {
    0.1
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_minutes: default_liveness_timeout_minutes(),
            consumption_timeout_minutes: default_consumption_timeout_minutes(),
            minimum_consumption_rate: default_minimum_consumption_rate(),
        }
    }
}

/// Load configuration: platform defaults, then an optional TOML file, then
/// `WIFI_INGEST_*` environment overrides, then validation.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Some(file_config) = load_from_file()? {
        config = file_config;
    }

    apply_env_overrides(&mut config)?;
    validate(&config)?;

    Ok(config)
}

fn load_from_file() -> Result<Option<Config>> {
    if let Ok(path) = env::var("WIFI_INGEST_CONFIG") {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {path}"))?;
        return Ok(Some(config));
    }

    if Path::new("./config.toml").exists() {
        let content = std::fs::read_to_string("./config.toml")
            .context("failed to read ./config.toml")?;
        let config: Config =
            toml::from_str(&content).context("failed to parse ./config.toml")?;
        return Ok(Some(config));
    }

    Ok(None)
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(v) = get_env_string("TOPIC")? {
        config.bus.topic = v;
    }
    if let Some(v) = get_env_string("CONSUMER_GROUP")? {
        config.bus.consumer_group = v;
    }
    if let Some(v) = get_env_string("BOOTSTRAP_SERVERS")? {
        config.bus.bootstrap_servers = v;
    }
    if let Some(v) = get_env_usize("BATCH_SIZE")? {
        config.bus.batch_size = v;
    }
    if let Some(v) = get_env_u64("BATCH_TIMEOUT_MS")? {
        config.bus.batch_timeout_ms = v;
    }

    if let Some(v) = get_env_bool("ENABLED")? {
        config.delivery.enabled = v;
    }
    if let Some(v) = get_env_string("DELIVERY_STREAM_NAME")? {
        config.delivery.delivery_stream_name = v;
    }
    if let Some(v) = get_env_string("REGION")? {
        config.delivery.region = Some(v);
    }
    if let Some(v) = get_env_string("ENDPOINT_OVERRIDE")? {
        config.delivery.endpoint_override = Some(v);
    }
    if let Some(v) = get_env_usize("MAX_BATCH_SIZE")? {
        config.delivery.max_batch_size = v;
    }
    if let Some(v) = get_env_usize("MAX_BATCH_SIZE_BYTES")? {
        config.delivery.max_batch_size_bytes = v;
    }
    if let Some(v) = get_env_usize("MAX_RECORD_SIZE_BYTES")? {
        config.delivery.max_record_size_bytes = v;
    }
    if let Some(v) = get_env_u64("MAX_RETRIES")? {
        config.delivery.max_retries = v as u32;
    }
    if let Some(v) = get_env_u64("RETRY_BACKOFF_MS")? {
        config.delivery.retry_backoff_ms = v;
    }
    if let Some(v) = get_env_u64("SLOW_BATCH_THRESHOLD_MS")? {
        config.delivery.slow_batch_threshold_ms = v;
    }

    if let Some(v) = get_env_u64("LIVENESS_TIMEOUT_MINUTES")? {
        config.health.liveness_timeout_minutes = v;
    }
    if let Some(v) = get_env_u64("CONSUMPTION_TIMEOUT_MINUTES")? {
        config.health.consumption_timeout_minutes = v;
    }
    if let Some(v) = get_env_f64("MINIMUM_CONSUMPTION_RATE")? {
        config.health.minimum_consumption_rate = v;
    }

    Ok(())
}

fn env_var(suffix: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn get_env_string(suffix: &str) -> Result<Option<String>> {
    Ok(env_var(suffix))
}

fn get_env_usize(suffix: &str) -> Result<Option<usize>> {
    match env_var(suffix) {
        Some(v) => Ok(Some(v.parse().with_context(|| {
            format!("{ENV_PREFIX}{suffix} must be a non-negative integer")
        })?)),
        None => Ok(None),
    }
}

fn get_env_u64(suffix: &str) -> Result<Option<u64>> {
    match env_var(suffix) {
        Some(v) => Ok(Some(v.parse().with_context(|| {
            format!("{ENV_PREFIX}{suffix} must be a non-negative integer")
        })?)),
        None => Ok(None),
    }
}

fn get_env_f64(suffix: &str) -> Result<Option<f64>> {
    match env_var(suffix) {
        Some(v) => Ok(Some(
            v.parse()
                .with_context(|| format!("{ENV_PREFIX}{suffix} must be a number"))?,
        )),
        None => Ok(None),
    }
}

fn get_env_bool(suffix: &str) -> Result<Option<bool>> {
    match env_var(suffix) {
        Some(v) => Ok(Some(v.parse().with_context(|| {
            format!("{ENV_PREFIX}{suffix} must be true or false")
        })?)),
        None => Ok(None),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.bus.topic.is_empty() {
        bail!("bus.topic must be set");
    }
    if config.bus.consumer_group.is_empty() {
        bail!("bus.consumer_group must be set");
    }
    if config.bus.bootstrap_servers.is_empty() {
        bail!("bus.bootstrap_servers must be set");
    }
    if config.delivery.enabled && config.delivery.delivery_stream_name.is_empty() {
        bail!("delivery.delivery_stream_name must be set when delivery is enabled");
    }
    if config.delivery.max_batch_size == 0 {
        bail!("delivery.max_batch_size must be greater than 0");
    }
    if config.delivery.max_record_size_bytes > config.delivery.max_batch_size_bytes {
        bail!("delivery.max_record_size_bytes must not exceed max_batch_size_bytes");
    }
    Ok(())
}
