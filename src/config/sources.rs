use serde::Deserialize;

use crate::config::schedule::{CacheConfig, HealthConfig, TokenConfig};
use crate::config::settings::SettingsConfig;
use crate::config::storage::StorageConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub upstream: UpstreamConfig,
    pub remote_config: RemoteConfigSource,
    pub fallback_credentials: Option<FallbackCredentials>,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// ================================
/// Upstream ticketing API + OAuth2 endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// base URL every dataset path is appended to
    pub api_base: String,
    /// OAuth2 token endpoint
    pub auth_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// header carrying `Bearer <token>` on upstream calls
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_token_timeout_seconds")]
    pub token_timeout_seconds: u64,
}

/// ================================
/// Remote config service (encrypted credential bundle)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfigSource {
    /// `{project_id}` is substituted at request time
    #[serde(default = "default_remote_config_url")]
    pub url: String,
    pub project_id: String,
    pub app_id: String,
    pub api_key: String,
    pub package_name: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    /// Blowfish key, 4..=56 bytes
    pub enc_key: String,
    /// Blowfish IV, exactly 8 bytes
    pub enc_iv: String,
    /// entry name holding the client id
    pub user_key: String,
    /// entry name holding the client secret
    pub pass_key: String,
    #[serde(default = "default_remote_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl RemoteConfigSource {
    pub fn fetch_url(&self) -> String {
        self.url.replace("{project_id}", &self.project_id)
    }
}

/// Statically configured credentials used when the remote bundle is unusable.
#[derive(Debug, Deserialize, Clone)]
pub struct FallbackCredentials {
    pub username: String,
    pub password: String,
}

fn default_user_agent() -> String {
    format!("parkfeed/{}", env!("CARGO_PKG_VERSION"))
}

fn default_accept_language() -> String {
    "de".to_string()
}

fn default_auth_header() -> String {
    "jwtauthorization".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_token_timeout_seconds() -> u64 {
    30
}

fn default_remote_config_url() -> String {
    "https://firebaseremoteconfig.googleapis.com/v1/projects/{project_id}/namespaces/firebase:fetch".to_string()
}

fn default_language_code() -> String {
    "en_GB".to_string()
}

fn default_remote_timeout_seconds() -> u64 {
    30
}
