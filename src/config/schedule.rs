use http::Method;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::upstream::datasets::Dataset;

/// ================================
/// Token lifecycle timing
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// tokens with less time-to-expiry than this are renewed eagerly
    #[serde(default = "default_refresh_buffer_seconds")]
    pub refresh_buffer_seconds: u64,
    /// lower bound for the refresh loop sleep
    #[serde(default = "default_min_refresh_interval_seconds")]
    pub min_refresh_interval_seconds: u64,
    /// sleep after a failed scheduled renewal
    #[serde(default = "default_retry_backoff_seconds")]
    pub retry_backoff_seconds: u64,
    /// key of the single row in the token store
    #[serde(default = "default_store_key")]
    pub store_key: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_buffer_seconds: default_refresh_buffer_seconds(),
            min_refresh_interval_seconds: default_min_refresh_interval_seconds(),
            retry_backoff_seconds: default_retry_backoff_seconds(),
            store_key: default_store_key(),
        }
    }
}

/// ================================
/// Cache refresh cadence + dataset endpoints
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_fast_interval_seconds")]
    pub fast_interval_seconds: u64,
    #[serde(default = "default_slow_interval_seconds")]
    pub slow_interval_seconds: u64,
    /// per-dataset endpoint overrides; missing datasets get their built-in endpoint
    #[serde(default)]
    pub datasets: HashMap<Dataset, DatasetEndpoint>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fast_interval_seconds: default_fast_interval_seconds(),
            slow_interval_seconds: default_slow_interval_seconds(),
            datasets: HashMap::new(),
        }
    }
}

/// Upstream request details for one dataset
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatasetEndpoint {
    pub path: String,
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// ================================
/// Daily health-check / credential refresh
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// identity endpoint probed with `?key=<api_key>`
    #[serde(default = "default_health_url")]
    pub url: String,
    /// local wall-clock time, HH:MM
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
    #[serde(default = "default_health_retry_seconds")]
    pub retry_seconds: u64,
    #[serde(default = "default_health_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_health_url(),
            daily_at: default_daily_at(),
            retry_seconds: default_health_retry_seconds(),
            timeout_seconds: default_health_timeout_seconds(),
        }
    }
}

fn default_refresh_buffer_seconds() -> u64 {
    600
}

fn default_min_refresh_interval_seconds() -> u64 {
    60
}

fn default_retry_backoff_seconds() -> u64 {
    60
}

fn default_store_key() -> String {
    "oauth".to_string()
}

fn default_fast_interval_seconds() -> u64 {
    300
}

fn default_slow_interval_seconds() -> u64 {
    86400
}

fn default_method() -> Method {
    Method::GET
}

fn default_true() -> bool {
    true
}

fn default_health_url() -> String {
    "https://identitytoolkit.googleapis.com/v1/accounts:signUp".to_string()
}

fn default_daily_at() -> String {
    "03:00".to_string()
}

fn default_health_retry_seconds() -> u64 {
    3600
}

fn default_health_timeout_seconds() -> u64 {
    30
}
