use thiserror::Error;

/// Upstream bodies are kept for diagnostics but never in full.
const MAX_BODY_CHARS: usize = 512;

/// Failure classes callers are expected to tell apart.
///
/// Everything else (transport errors, storage I/O) travels as a plain
/// `anyhow::Error`; use `err.downcast_ref::<ServiceError>()` to classify.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed ciphertext or key material. Recoverable per remote-config entry.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Neither remote nor fallback credentials are available.
    #[error("no client credentials available (remote config unusable and no fallback configured)")]
    CredentialUnavailable,

    /// No unexpired access token is held.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Non-2xx response from the upstream API after any retry.
    #[error("upstream responded with {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("storage: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn upstream(status: u16, body: &str) -> Self {
        let body = if body.chars().count() > MAX_BODY_CHARS {
            let truncated: String = body.chars().take(MAX_BODY_CHARS).collect();
            format!("{}...", truncated)
        } else {
            body.to_owned()
        };
        ServiceError::Upstream { status, body }
    }

    /// HTTP status for `Upstream` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}
