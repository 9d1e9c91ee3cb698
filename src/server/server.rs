use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::manager::TokenManager;
use crate::cache::orchestrator::CacheOrchestrator;
use crate::config::settings::SettingsConfig;
use crate::health::checker::HealthChecker;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use crate::server::handlers;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub tokens: Arc<TokenManager>,
    pub cache: Arc<CacheOrchestrator>,
    pub health: Arc<HealthChecker>,
}

pub fn build_router(state: AppState, settings_config: &SettingsConfig) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .merge(handlers::router())
        .with_state(state)
}

/// Serves until `shutdown` is cancelled.
pub async fn start(settings_config: &SettingsConfig, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let metrics = get_metrics().await;
    let app = build_router(state, settings_config);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("http server failed")?;
    metrics.up.set(0);
    Ok(())
}
