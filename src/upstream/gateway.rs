use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use http::{HeaderName, Method, StatusCode};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::manager::{AuthHeader, TokenManager};
use crate::config::schedule::DatasetEndpoint;
use crate::config::sources::UpstreamConfig;
use crate::errors::ServiceError;
use crate::observability::metrics::get_metrics;

/// Authenticated calls against the upstream API.
///
/// A 401 triggers one forced renewal and one retry. Anything else non-2xx,
/// and every transport error, goes straight back to the caller.
pub struct UpstreamGateway {
    client: Client,
    api_base: String,
    auth_header: HeaderName,
    accept_language: String,
    user_agent: String,
    tokens: Arc<TokenManager>,
}

impl UpstreamGateway {
    pub fn new(cfg: &UpstreamConfig, tokens: Arc<TokenManager>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()
            .context("failed to build upstream HTTP client")?;
        let auth_header = HeaderName::from_bytes(cfg.auth_header.as_bytes())
            .with_context(|| format!("invalid auth header name '{}'", cfg.auth_header))?;

        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_owned(),
            auth_header,
            accept_language: cfg.accept_language.to_owned(),
            user_agent: cfg.user_agent.to_owned(),
            tokens,
        })
    }

    pub async fn fetch(&self, endpoint: &DatasetEndpoint) -> Result<Value> {
        self.call(&endpoint.path, endpoint.method.clone(), &endpoint.params, None).await
    }

    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        params: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Result<Value> {
        let auth = self.tokens.current_auth_header().await?;
        info!("upstream request: {} {}", method, endpoint);

        let mut response = self.send(endpoint, &method, params, body, &auth).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let renewed = self.tokens.force_renewal(auth.generation).await?;
            response = self.send(endpoint, &method, params, body, &renewed).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("upstream error on {}: {}", endpoint, status);
            return Err(ServiceError::upstream(status.as_u16(), &text).into());
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("upstream {} returned invalid JSON", endpoint))
    }

    async fn send(
        &self,
        endpoint: &str,
        method: &Method,
        params: &BTreeMap<String, String>,
        body: Option<&Value>,
        auth: &AuthHeader,
    ) -> Result<Response> {
        let metrics = get_metrics().await;
        let url = format!("{}{}", self.api_base, endpoint);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(&self.auth_header, &auth.value)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.accept_language)
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let result = request.send().await;
        metrics
            .upstream_duration
            .with_label_values(&[endpoint])
            .observe(start.elapsed().as_secs_f64());

        let status_label = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(_) => "transport_error".to_owned(),
        };
        metrics.upstream_requests.with_label_values(&[endpoint, status_label.as_str()]).inc();

        Ok(result?)
    }
}
