//! Composition root: every long-lived service is built once here and handed
//! to its consumers as an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::manager::TokenManager;
use crate::auth::oauth2::OAuth2Client;
use crate::cache::orchestrator::CacheOrchestrator;
use crate::config::sources::ServiceConfig;
use crate::credentials::resolver::CredentialResolver;
use crate::health::checker::HealthChecker;
use crate::health::scheduler::HealthScheduler;
use crate::helpers::task::LoopHandle;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use crate::server::server::{self, AppState};
use crate::store::cache_store::CacheStore;
use crate::store::open_stores;
use crate::store::token_store::TokenStore;
use crate::upstream::gateway::UpstreamGateway;

pub struct App {
    config: ServiceConfig,
    shutdown: CancellationToken,
    resolver: Arc<CredentialResolver>,
    tokens: Arc<TokenManager>,
    cache: Arc<CacheOrchestrator>,
    health: Arc<HealthChecker>,
    health_scheduler: Arc<HealthScheduler>,
    /// starts the cache once a late token arrives
    cache_gate: Mutex<Option<LoopHandle>>,
    server: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl App {
    pub async fn build(config: ServiceConfig) -> Result<Self> {
        let shutdown = CancellationToken::new();
        let (token_backend, cache_backend) = open_stores(&config.storage).await?;

        let resolver = Arc::new(CredentialResolver::new(
            config.remote_config.to_owned(),
            config.fallback_credentials.to_owned(),
        )?);

        let tokens = Arc::new(TokenManager::new(
            config.token.to_owned(),
            OAuth2Client::new(&config.upstream)?,
            resolver.clone(),
            TokenStore::new(token_backend, config.token.store_key.to_owned()),
            shutdown.clone(),
        ));

        let gateway = Arc::new(UpstreamGateway::new(&config.upstream, tokens.clone())?);
        let cache = Arc::new(CacheOrchestrator::new(
            &config.cache,
            gateway,
            CacheStore::new(cache_backend),
            shutdown.clone(),
        ));

        let health = Arc::new(HealthChecker::new(&config.health, &config.remote_config.api_key)?);
        let health_scheduler = Arc::new(HealthScheduler::new(
            &config.health,
            health.clone(),
            resolver.clone(),
            shutdown.clone(),
        )?);

        Ok(Self {
            config,
            shutdown,
            resolver,
            tokens,
            cache,
            health,
            health_scheduler,
            cache_gate: Mutex::new(None),
            server: Mutex::new(None),
        })
    }

    /// Health probe, authentication, background loops, then the HTTP server.
    /// Returns whether the service came up authenticated.
    pub async fn start(&self) -> Result<bool> {
        if self.config.health.enabled {
            let status = self.health.check().await;
            info!("startup health check: healthy={}", status.is_healthy);
        }

        let authenticated = self.tokens.initialize().await;
        if authenticated {
            self.cache.start().await;
        } else {
            warn!("authentication failed, serving cached data only until a token is obtained");
            let (tokens, cache) = (self.tokens.clone(), self.cache.clone());
            let gate = LoopHandle::spawn("cache gate", &self.shutdown, move |cancel| async move {
                if tokens.wait_authenticated(&cancel).await {
                    info!("authenticated after startup, starting cache loops");
                    cache.start().await;
                }
            });
            *self.cache_gate.lock().await = Some(gate);
        }

        if self.config.health.enabled {
            self.health_scheduler.start().await;
        }

        let settings = self.config.settings.to_owned();
        let state = self.state().await;
        let shutdown = self.shutdown.clone();
        *self.server.lock().await = Some(tokio::spawn(async move {
            server::start(&settings, state, shutdown).await
        }));

        info!("service started");
        Ok(authenticated)
    }

    pub async fn state(&self) -> AppState {
        AppState {
            metrics_state: MetricsState::new(get_metrics().await.registry.clone()),
            tokens: self.tokens.clone(),
            cache: self.cache.clone(),
            health: self.health.clone(),
        }
    }

    /// Cancels every loop and joins each within the configured timeout.
    pub async fn shutdown(&self) {
        info!("shutting down ...");
        let timeout = Duration::from_secs(self.config.settings.shutdown_timeout_seconds);
        self.shutdown.cancel();

        if let Some(gate) = self.cache_gate.lock().await.take() {
            gate.stop(timeout).await;
        }
        self.cache.stop(timeout).await;
        self.health_scheduler.stop(timeout).await;
        self.tokens.shutdown(timeout).await;

        if let Some(mut handle) = self.server.lock().await.take() {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(Ok(()))) => info!("http server stopped"),
                Ok(Ok(Err(e))) => error!("http server exited with error: {:#}", e),
                Ok(Err(e)) => error!("http server task failed: {}", e),
                Err(_) => {
                    warn!("http server did not stop within {:?}, aborting", timeout);
                    handle.abort();
                }
            }
        }
        info!("shutdown complete");
    }

    /// Resolves once shutdown was requested.
    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn cache(&self) -> &Arc<CacheOrchestrator> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<CredentialResolver> {
        &self.resolver
    }
}
