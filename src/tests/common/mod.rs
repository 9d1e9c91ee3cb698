pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blowfish::Blowfish;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use tokio_util::sync::CancellationToken;

use crate::auth::manager::TokenManager;
use crate::auth::oauth2::OAuth2Client;
use crate::config::proc_loader::parse_config;
use crate::credentials::resolver::CredentialResolver;
use crate::store::mem::MemoryStore;
use crate::store::token_store::TokenStore;
use crate::ServiceConfig;

pub const ENC_KEY: &str = "parkfeed-test-key";
pub const ENC_IV: &str = "abcdefgh";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Blowfish-CBC + PKCS#7, base64 encoded; the inverse of the remote-config decoding.
pub fn encrypt_blowfish(plaintext: &str, key: &str, iv: &str) -> String {
    let encryptor = cbc::Encryptor::<Blowfish>::new_from_slices(key.as_bytes(), iv.as_bytes()).unwrap();
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    BASE64.encode(ciphertext)
}

/// Minimal valid config pointing every collaborator at the given base URLs.
pub async fn test_config(api_base: &str, auth_url: &str, remote_url: &str) -> ServiceConfig {
    let yaml = format!(
        r#"
settings:
  logging:
    level: debug
    format: compact
upstream:
  api_base: "{api_base}"
  auth_url: "{auth_url}"
  request_timeout_seconds: 5
  token_timeout_seconds: 5
remote_config:
  url: "{remote_url}"
  project_id: "test-project"
  app_id: "1:123:android:abc"
  api_key: "test-api-key"
  package_name: "com.example.park"
  enc_key: "{ENC_KEY}"
  enc_iv: "{ENC_IV}"
  user_key: "api_user"
  pass_key: "api_pass"
  timeout_seconds: 5
fallback_credentials:
  username: "fallback-client-id"
  password: "fallback-secret"
storage:
  backend: memory
health:
  enabled: false
"#
    );
    parse_config(yaml).await.expect("test config must be valid")
}

/// Token manager backed by a memory store, built the way the app builds it.
pub fn build_token_manager(config: &ServiceConfig) -> (Arc<TokenManager>, TokenStore) {
    let resolver = Arc::new(
        CredentialResolver::new(config.remote_config.to_owned(), config.fallback_credentials.to_owned()).unwrap(),
    );
    let store = TokenStore::new(Arc::new(MemoryStore::new()), config.token.store_key.to_owned());
    let manager = Arc::new(TokenManager::new(
        config.token.to_owned(),
        OAuth2Client::new(&config.upstream).unwrap(),
        resolver,
        store.clone(),
        CancellationToken::new(),
    ));
    (manager, store)
}
