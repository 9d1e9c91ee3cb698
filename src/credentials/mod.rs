use std::fmt;

pub mod installation_id;
pub mod resolver;

/// Where a resolved bundle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Remote,
    Fallback,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Remote => "remote",
            CredentialSource::Fallback => "fallback",
        }
    }
}

/// Client identifier/secret pair used against the OAuth2 endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub username: String,
    pub password: String,
    pub source: CredentialSource,
}

impl CredentialBundle {
    /// First 8 characters of the client id, for logs.
    pub fn client_id_hint(&self) -> String {
        let hint: String = self.username.chars().take(8).collect();
        format!("{}...", hint)
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("username", &self.client_id_hint())
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}
