use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::token::TokenRecord;
use crate::config::sources::UpstreamConfig;
use crate::credentials::CredentialBundle;
use crate::errors::ServiceError;

#[derive(Debug, Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum GrantRequest<'a> {
    ClientCredentials {
        client_id: &'a str,
        client_secret: &'a str,
    },
    RefreshToken {
        client_id: &'a str,
        client_secret: &'a str,
        refresh_token: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

/// Talks to the OAuth2 token endpoint. JSON bodies, not form encoded.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    client: Client,
    auth_url: String,
    user_agent: String,
}

impl OAuth2Client {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.token_timeout_seconds))
            .build()
            .context("failed to build OAuth2 HTTP client")?;
        Ok(Self { client, auth_url: cfg.auth_url.to_owned(), user_agent: cfg.user_agent.to_owned() })
    }

    pub async fn client_credentials(&self, credentials: &CredentialBundle) -> Result<TokenRecord> {
        info!("requesting new OAuth2 token, client_id: {}", credentials.client_id_hint());
        self.grant(&GrantRequest::ClientCredentials {
            client_id: &credentials.username,
            client_secret: &credentials.password,
        })
        .await
    }

    pub async fn refresh(&self, credentials: &CredentialBundle, refresh_token: &str) -> Result<TokenRecord> {
        info!("refreshing OAuth2 token with refresh_token grant");
        self.grant(&GrantRequest::RefreshToken {
            client_id: &credentials.username,
            client_secret: &credentials.password,
            refresh_token,
        })
        .await
    }

    async fn grant(&self, request: &GrantRequest<'_>) -> Result<TokenRecord> {
        let response = self
            .client
            .post(&self.auth_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::upstream(status.as_u16(), &body))
                .context("OAuth2 token request failed");
        }

        let data: TokenResponse = response.json().await.context("token response is not valid JSON")?;
        if data.access_token.is_empty() {
            return Err(anyhow!("token response carries an empty access_token"));
        }

        let record = TokenRecord::new(
            data.access_token,
            data.refresh_token,
            data.token_type,
            data.expires_in,
            Utc::now(),
        );
        debug!("token issued, expires at {}", record.expires_at);
        Ok(record)
    }
}
