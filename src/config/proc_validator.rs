//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks URL shapes, cipher material sizes, timing invariants,
//!   storage keys and the HTTP surface settings

use chrono::NaiveTime;
use http::HeaderName;
use tracing::{error, info};

use crate::config::schedule::{CacheConfig, HealthConfig, TokenConfig};
use crate::config::settings::SettingsConfig;
use crate::config::sources::{FallbackCredentials, RemoteConfigSource, ServiceConfig, UpstreamConfig};
use crate::config::storage::{StorageBackend, StorageConfig};
use crate::observability::metrics::get_metrics;
use crate::store::is_valid_key;

const BLOWFISH_KEY_MIN: usize = 4;
const BLOWFISH_KEY_MAX: usize = 56;
const BLOWFISH_IV_LEN: usize = 8;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_upstream(&cfg.upstream, &mut errors);
    validate_remote_config(&cfg.remote_config, &mut errors);
    if let Some(fallback) = &cfg.fallback_credentials {
        validate_fallback(fallback, &mut errors);
    }
    validate_token(&cfg.token, &mut errors);
    validate_cache(&cfg.cache, &mut errors);
    validate_storage(&cfg.storage, &mut errors);
    validate_health(&cfg.health, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }
    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
    if settings.shutdown_timeout_seconds == 0 {
        errors.push("settings.shutdown_timeout_seconds must be > 0".to_string());
    }
}

/// UPSTREAM VALIDATION
fn validate_upstream(upstream: &UpstreamConfig, errors: &mut Vec<String>) {
    validate_http_url("upstream.api_base", &upstream.api_base, errors);
    validate_http_url("upstream.auth_url", &upstream.auth_url, errors);
    if HeaderName::from_bytes(upstream.auth_header.as_bytes()).is_err() {
        errors.push(format!(
            "upstream.auth_header '{}' is not a valid header name",
            upstream.auth_header
        ));
    }
    if upstream.request_timeout_seconds == 0 {
        errors.push("upstream.request_timeout_seconds must be > 0".to_string());
    }
    if upstream.token_timeout_seconds == 0 {
        errors.push("upstream.token_timeout_seconds must be > 0".to_string());
    }
}

/// REMOTE CONFIG VALIDATION
fn validate_remote_config(remote: &RemoteConfigSource, errors: &mut Vec<String>) {
    validate_http_url("remote_config.url", &remote.fetch_url(), errors);
    for (field, value) in [
        ("project_id", &remote.project_id),
        ("app_id", &remote.app_id),
        ("api_key", &remote.api_key),
        ("package_name", &remote.package_name),
        ("user_key", &remote.user_key),
        ("pass_key", &remote.pass_key),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("remote_config.{} must not be empty", field));
        }
    }

    let key_len = remote.enc_key.len();
    if !(BLOWFISH_KEY_MIN..=BLOWFISH_KEY_MAX).contains(&key_len) {
        errors.push(format!(
            "remote_config.enc_key must be {}-{} bytes, got {}",
            BLOWFISH_KEY_MIN, BLOWFISH_KEY_MAX, key_len
        ));
    }
    if remote.enc_iv.len() != BLOWFISH_IV_LEN {
        errors.push(format!(
            "remote_config.enc_iv must be exactly {} bytes, got {}",
            BLOWFISH_IV_LEN,
            remote.enc_iv.len()
        ));
    }
    if remote.timeout_seconds == 0 {
        errors.push("remote_config.timeout_seconds must be > 0".to_string());
    }
}

fn validate_fallback(fallback: &FallbackCredentials, errors: &mut Vec<String>) {
    if fallback.username.is_empty() || fallback.password.is_empty() {
        errors.push("fallback_credentials requires both username and password".to_string());
    }
}

/// TOKEN VALIDATION
fn validate_token(token: &TokenConfig, errors: &mut Vec<String>) {
    if token.min_refresh_interval_seconds == 0 {
        errors.push("token.min_refresh_interval_seconds must be > 0".to_string());
    }
    if token.retry_backoff_seconds == 0 {
        errors.push("token.retry_backoff_seconds must be > 0".to_string());
    }
    if !is_valid_key(&token.store_key) {
        errors.push(format!(
            "token.store_key '{}' may only contain [A-Za-z0-9_-]",
            token.store_key
        ));
    }
}

/// CACHE VALIDATION
fn validate_cache(cache: &CacheConfig, errors: &mut Vec<String>) {
    if cache.fast_interval_seconds == 0 {
        errors.push("cache.fast_interval_seconds must be > 0".to_string());
    }
    if cache.slow_interval_seconds == 0 {
        errors.push("cache.slow_interval_seconds must be > 0".to_string());
    }
    for (dataset, endpoint) in &cache.datasets {
        if !endpoint.path.starts_with('/') {
            errors.push(format!(
                "cache.datasets['{}'].path '{}' must start with '/'",
                dataset, endpoint.path
            ));
        }
    }
}

/// STORAGE VALIDATION
fn validate_storage(storage: &StorageConfig, errors: &mut Vec<String>) {
    if storage.backend != StorageBackend::Memory && storage.path.trim().is_empty() {
        errors.push("storage.path must not be empty".to_string());
    }
}

/// HEALTH VALIDATION
fn validate_health(health: &HealthConfig, errors: &mut Vec<String>) {
    if NaiveTime::parse_from_str(&health.daily_at, "%H:%M").is_err() {
        errors.push(format!(
            "health.daily_at '{}' must be a HH:MM time",
            health.daily_at
        ));
    }
    if !health.enabled {
        return;
    }
    validate_http_url("health.url", &health.url, errors);
    if health.retry_seconds == 0 {
        errors.push("health.retry_seconds must be > 0".to_string());
    }
}

fn validate_http_url(field: &str, value: &str, errors: &mut Vec<String>) {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        errors.push(format!("{} '{}' must be an http(s) URL", field, value));
    }
}
