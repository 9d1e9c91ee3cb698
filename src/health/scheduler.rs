use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::NaiveTime;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::schedule::HealthConfig;
use crate::credentials::resolver::CredentialResolver;
use crate::health::checker::HealthChecker;
use crate::helpers::task::{sleep_or_cancel, LoopHandle};
use crate::helpers::time::{parse_daily_at, until_next_daily};

/// Once a day: probe the remote identity endpoint, then re-resolve credentials.
pub struct HealthScheduler {
    checker: Arc<HealthChecker>,
    resolver: Arc<CredentialResolver>,
    daily_at: NaiveTime,
    retry: Duration,
    handle: Mutex<Option<LoopHandle>>,
    shutdown: CancellationToken,
}

impl HealthScheduler {
    pub fn new(
        cfg: &HealthConfig,
        checker: Arc<HealthChecker>,
        resolver: Arc<CredentialResolver>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let daily_at = parse_daily_at(&cfg.daily_at)
            .ok_or_else(|| anyhow!("health.daily_at '{}' is not HH:MM", cfg.daily_at))?;
        Ok(Self {
            checker,
            resolver,
            daily_at,
            retry: Duration::from_secs(cfg.retry_seconds),
            handle: Mutex::new(None),
            shutdown,
        })
    }

    pub async fn start(self: &Arc<Self>) {
        let mut slot = self.handle.lock().await;
        if slot.as_ref().is_some_and(|h| h.is_running()) {
            return;
        }
        let scheduler = Arc::clone(self);
        *slot = Some(LoopHandle::spawn("daily health", &self.shutdown, move |cancel| {
            scheduler.run(cancel)
        }));
    }

    pub async fn stop(&self, timeout: Duration) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.stop(timeout).await;
        }
    }

    /// One health check followed by a forced credential refresh.
    pub async fn run_once(&self) -> Result<()> {
        let status = self.checker.check().await;
        if !status.is_healthy {
            info!("remote endpoint unhealthy: {}", status.last_error.as_deref().unwrap_or("unknown"));
        }
        let bundle = self.resolver.resolve(true).await?;
        info!("credentials refreshed from {}", bundle.source.as_str());
        Ok(())
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let wait = until_next_daily(self.daily_at);
            info!("next health check in {:.2}h", wait.as_secs_f64() / 3600.0);
            if !sleep_or_cancel(wait, &cancel).await {
                break;
            }

            let result = tokio::select! {
                result = self.run_once() => result,
                _ = cancel.cancelled() => break,
            };
            if let Err(e) = result {
                error!("daily health check failed: {:#}", e);
                if !sleep_or_cancel(self.retry, &cancel).await {
                    break;
                }
            }
        }
        info!("daily health loop finished");
    }
}
