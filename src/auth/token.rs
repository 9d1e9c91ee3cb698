use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 86400;

/// The single OAuth2 grant the service holds
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    /// absent when the token endpoint did not issue one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        token_type: Option<String>,
        expires_in_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_in = expires_in_seconds.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            token_type: token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(default_token_type),
            expires_at: now + ChronoDuration::seconds(expires_in),
            created_at: now,
        }
    }

    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// Less than `buffer` left: still valid, but due for renewal.
    pub fn is_stale_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.seconds_until_expiry(now) < buffer.as_secs() as i64
    }

    pub fn is_stale(&self, buffer: Duration) -> bool {
        self.is_stale_at(Utc::now(), buffer)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// `<token_type> <access_token>`
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

// keeps tokens out of logs
impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// How long the refresh loop sleeps: `max(expiry - now - buffer, min_interval)`.
pub fn refresh_sleep(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    buffer: Duration,
    min_interval: Duration,
) -> Duration {
    let remaining = (expires_at - now).num_seconds() - buffer.as_secs() as i64;
    let min_secs = min_interval.as_secs() as i64;
    Duration::from_secs(remaining.max(min_secs).max(0) as u64)
}

/// Snapshot exposed on `/health` and `/status`
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in_seconds: Option<i64>,
    pub has_refresh_token: bool,
    pub refresh_loop_running: bool,
    pub generation: u64,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}
