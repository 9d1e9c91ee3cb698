use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::sources::{FallbackCredentials, RemoteConfigSource};
use crate::credentials::installation_id::generate_installation_id;
use crate::credentials::{CredentialBundle, CredentialSource};
use crate::crypto::blowfish::decrypt_blowfish;
use crate::errors::ServiceError;
use crate::observability::metrics::get_metrics;

static API_KEY_HEADER: &str = "X-Goog-Api-Key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteConfigRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    app_instance_id: Option<String>,
    app_id: &'a str,
    package_name: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteConfigResponse {
    entries: Option<HashMap<String, Value>>,
}

/// Resolves the OAuth2 client credentials from the encrypted remote config,
/// degrading to the statically configured pair.
///
/// The resolved bundle is cached for the process lifetime; `resolve(true)`
/// bypasses the cache. Concurrent resolutions share one remote fetch.
pub struct CredentialResolver {
    client: Client,
    remote: RemoteConfigSource,
    fallback: Option<FallbackCredentials>,
    cached: Mutex<Option<CredentialBundle>>,
}

impl CredentialResolver {
    pub fn new(remote: RemoteConfigSource, fallback: Option<FallbackCredentials>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(remote.timeout_seconds))
            .build()
            .context("failed to build remote config HTTP client")?;
        Ok(Self { client, remote, fallback, cached: Mutex::new(None) })
    }

    pub async fn resolve(&self, force_refresh: bool) -> Result<CredentialBundle> {
        let mut cached = self.cached.lock().await;
        if let Some(bundle) = cached.as_ref().filter(|_| !force_refresh) {
            return Ok(bundle.clone());
        }

        let entries = match self.fetch_remote_config().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("remote config unavailable: {:#}", e);
                HashMap::new()
            }
        };

        let bundle = self.bundle_from_entries(&entries)?;
        get_metrics()
            .await
            .credential_resolutions
            .with_label_values(&[bundle.source.as_str()])
            .inc();

        *cached = Some(bundle.clone());
        Ok(bundle)
    }

    /// Fetches the remote namespace and decrypts every entry.
    ///
    /// Entries that fail to decrypt keep their raw value.
    pub async fn fetch_remote_config(&self) -> Result<HashMap<String, String>> {
        let payload = RemoteConfigRequest {
            app_instance_id: generate_installation_id(),
            app_id: &self.remote.app_id,
            package_name: &self.remote.package_name,
            language_code: &self.remote.language_code,
        };

        info!("fetching remote config ...");
        let response = self
            .client
            .post(self.remote.fetch_url())
            .header(API_KEY_HEADER, &self.remote.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(status.as_u16(), &body).into());
        }

        let data: RemoteConfigResponse = response.json().await.context("remote config body is not valid JSON")?;
        let Some(raw_entries) = data.entries else {
            warn!("remote config response has no 'entries'");
            return Ok(HashMap::new());
        };

        let decrypted = self.decrypt_entries(raw_entries).await;
        info!("remote config fetched, {} entries", decrypted.len());
        Ok(decrypted)
    }

    async fn decrypt_entries(&self, raw_entries: HashMap<String, Value>) -> HashMap<String, String> {
        let metrics = get_metrics().await;
        raw_entries
            .into_iter()
            .map(|(key, value)| {
                let raw = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                match decrypt_blowfish(&raw, &self.remote.enc_key, &self.remote.enc_iv) {
                    Ok(plaintext) => (key, plaintext),
                    Err(e) => {
                        warn!(entry = %key, "could not decrypt remote config entry: {}", e);
                        metrics.decryption_failures.inc();
                        (key, raw)
                    }
                }
            })
            .collect()
    }

    fn bundle_from_entries(&self, entries: &HashMap<String, String>) -> Result<CredentialBundle> {
        let username = entries.get(&self.remote.user_key).filter(|v| !v.is_empty());
        let password = entries.get(&self.remote.pass_key).filter(|v| !v.is_empty());

        if let (Some(username), Some(password)) = (username, password) {
            let bundle = CredentialBundle {
                username: username.to_owned(),
                password: password.to_owned(),
                source: CredentialSource::Remote,
            };
            info!("credentials loaded from remote config, client_id: {}", bundle.client_id_hint());
            return Ok(bundle);
        }

        warn!("remote config credentials not found, using configured fallback");
        let fallback = self
            .fallback
            .as_ref()
            .ok_or(ServiceError::CredentialUnavailable)?;
        debug!("fallback client_id: {}", fallback.username.chars().take(8).collect::<String>());

        Ok(CredentialBundle {
            username: fallback.username.to_owned(),
            password: fallback.password.to_owned(),
            source: CredentialSource::Fallback,
        })
    }
}
