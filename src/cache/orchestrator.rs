use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::schedule::{CacheConfig, DatasetEndpoint};
use crate::helpers::task::{sleep_or_cancel, LoopHandle};
use crate::observability::metrics::get_metrics;
use crate::store::cache_store::{CacheEntry, CacheStore};
use crate::upstream::datasets::{Cadence, Dataset};
use crate::upstream::gateway::UpstreamGateway;

/// Result of refreshing one dataset in a cycle
#[derive(Debug)]
pub struct RefreshOutcome {
    pub dataset: Dataset,
    pub error: Option<String>,
}

impl RefreshOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Keeps the cached datasets fresh with one loop per cadence.
///
/// Assumes the token manager is authenticated before `start`.
pub struct CacheOrchestrator {
    gateway: Arc<UpstreamGateway>,
    store: CacheStore,
    endpoints: HashMap<Dataset, DatasetEndpoint>,
    fast_interval: Duration,
    slow_interval: Duration,
    loops: Mutex<Vec<LoopHandle>>,
    shutdown: CancellationToken,
}

impl CacheOrchestrator {
    pub fn new(
        cfg: &CacheConfig,
        gateway: Arc<UpstreamGateway>,
        store: CacheStore,
        shutdown: CancellationToken,
    ) -> Self {
        let endpoints = Dataset::ALL
            .into_iter()
            .map(|d| (d, cfg.datasets.get(&d).cloned().unwrap_or_else(|| d.default_endpoint())))
            .collect();

        Self {
            gateway,
            store,
            endpoints,
            fast_interval: Duration::from_secs(cfg.fast_interval_seconds),
            slow_interval: Duration::from_secs(cfg.slow_interval_seconds),
            loops: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Starts both loops. No-op while they are running.
    pub async fn start(self: &Arc<Self>) {
        let mut loops = self.loops.lock().await;
        if loops.iter().any(|l| l.is_running()) {
            debug!("cache loops already running");
            return;
        }
        loops.clear();

        for (name, cadence, interval) in [
            ("fast cache", Cadence::Fast, self.fast_interval),
            ("slow cache", Cadence::Slow, self.slow_interval),
        ] {
            let orchestrator = Arc::clone(self);
            loops.push(LoopHandle::spawn(name, &self.shutdown, move |cancel| {
                orchestrator.refresh_loop(cadence, interval, cancel)
            }));
        }
    }

    pub async fn stop(&self, timeout: Duration) {
        let handles: Vec<LoopHandle> = self.loops.lock().await.drain(..).collect();
        for handle in handles {
            handle.stop(timeout).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.loops.lock().await.iter().any(|l| l.is_running())
    }

    async fn refresh_loop(self: Arc<Self>, cadence: Cadence, interval: Duration, cancel: CancellationToken) {
        loop {
            let cycle = tokio::select! {
                outcomes = self.refresh(cadence) => outcomes,
                _ = cancel.cancelled() => break,
            };
            let failed = cycle.iter().filter(|o| !o.is_ok()).count();
            debug!("{:?} cache cycle done, {} of {} failed", cadence, failed, cycle.len());

            if !sleep_or_cancel(interval, &cancel).await {
                break;
            }
        }
        info!("{:?} cache loop finished", cadence);
    }

    pub async fn refresh_fast(self: &Arc<Self>) -> Vec<RefreshOutcome> {
        self.refresh(Cadence::Fast).await
    }

    pub async fn refresh_slow(self: &Arc<Self>) -> Vec<RefreshOutcome> {
        self.refresh(Cadence::Slow).await
    }

    /// Fetches every dataset of `cadence` in parallel; each one commits or fails on its own.
    pub async fn refresh(self: &Arc<Self>, cadence: Cadence) -> Vec<RefreshOutcome> {
        let mut tasks = JoinSet::new();
        for dataset in Dataset::with_cadence(cadence) {
            let orchestrator = Arc::clone(self);
            tasks.spawn(async move {
                let result = orchestrator.refresh_dataset(dataset).await;
                RefreshOutcome { dataset, error: result.err().map(|e| format!("{:#}", e)) }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("cache refresh task failed: {}", e),
            }
        }
        outcomes.sort_by_key(|o| o.dataset);
        outcomes
    }

    /// Fetch and commit one dataset. On error the previous entry is left alone.
    pub async fn refresh_dataset(&self, dataset: Dataset) -> Result<()> {
        let metrics = get_metrics().await;
        let endpoint = self
            .endpoints
            .get(&dataset)
            .ok_or_else(|| anyhow!("no endpoint for dataset '{}'", dataset))?;

        let payload = match self.gateway.fetch(endpoint).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(dataset = %dataset, "cache refresh failed: {:#}", e);
                metrics.cache_refreshes.with_label_values(&[dataset.key(), "failure"]).inc();
                return Err(e);
            }
        };

        let now = Utc::now();
        if let Err(e) = self.store.save(dataset, &payload, now).await {
            warn!(dataset = %dataset, "cache write failed: {:#}", e);
            metrics.cache_refreshes.with_label_values(&[dataset.key(), "failure"]).inc();
            return Err(e);
        }

        metrics.cache_refreshes.with_label_values(&[dataset.key(), "success"]).inc();
        metrics.cache_last_success_unix.with_label_values(&[dataset.key()]).set(now.timestamp());
        info!(dataset = %dataset, "cache updated");
        Ok(())
    }

    /// Live upstream fetch for one dataset. Nothing is written to the cache.
    pub async fn fetch_live(&self, dataset: Dataset) -> Result<Value> {
        let endpoint = self
            .endpoints
            .get(&dataset)
            .ok_or_else(|| anyhow!("no endpoint for dataset '{}'", dataset))?;
        self.gateway.fetch(endpoint).await
    }

    /// Point read, no side effects.
    pub async fn load(&self, key: Dataset) -> Result<Option<CacheEntry>> {
        self.store.load(key).await
    }

    /// `updated_at` for every dataset, `None` when never written.
    pub async fn last_updated(&self) -> BTreeMap<Dataset, Option<DateTime<Utc>>> {
        let mut out = BTreeMap::new();
        for dataset in Dataset::ALL {
            let updated_at = match self.store.load(dataset).await {
                Ok(entry) => entry.map(|e| e.updated_at),
                Err(e) => {
                    warn!(dataset = %dataset, "could not read cache entry: {:#}", e);
                    None
                }
            };
            out.insert(dataset, updated_at);
        }
        out
    }
}
