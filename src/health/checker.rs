use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use http::StatusCode;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::schedule::HealthConfig;
use crate::observability::metrics::get_metrics;

/// Outcome of the last identity endpoint probe
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub response_time_ms: Option<f64>,
}

/// Probes the identity endpoint with the remote-config API key.
/// 200 and 400 both prove the endpoint is reachable and accepts the key format.
pub struct HealthChecker {
    client: Client,
    url: String,
    api_key: String,
    status: RwLock<HealthStatus>,
}

impl HealthChecker {
    pub fn new(cfg: &HealthConfig, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .context("failed to build health check HTTP client")?;
        Ok(Self {
            client,
            url: cfg.url.to_owned(),
            api_key: api_key.to_owned(),
            status: RwLock::new(HealthStatus::default()),
        })
    }

    pub async fn check(&self) -> HealthStatus {
        let started = Instant::now();
        let result = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "returnSecureToken": false }))
            .send()
            .await;

        let mut status = HealthStatus { last_check: Some(Utc::now()), ..Default::default() };
        match result {
            Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::BAD_REQUEST) => {
                let elapsed = started.elapsed().as_secs_f64() * 1000.0;
                status.is_healthy = true;
                status.response_time_ms = Some(elapsed);
                info!("remote health check passed in {:.2}ms", elapsed);
            }
            Ok(response) => {
                status.response_time_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
                status.last_error = Some(format!("unexpected status code: {}", response.status().as_u16()));
                warn!("remote health check failed, status {}", response.status());
            }
            Err(e) => {
                let kind = if e.is_timeout() { "timeout" } else { "request error" };
                status.last_error = Some(format!("{}: {}", kind, e));
                error!("remote health check {}: {}", kind, e);
            }
        }

        get_metrics().await.health_check_up.set(status.is_healthy as i64);
        *self.status.write().await = status.clone();
        status
    }

    pub async fn status(&self) -> HealthStatus {
        self.status.read().await.clone()
    }
}
