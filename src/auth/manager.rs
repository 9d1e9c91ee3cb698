use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::oauth2::OAuth2Client;
use crate::auth::token::{refresh_sleep, TokenRecord, TokenStatus};
use crate::config::schedule::TokenConfig;
use crate::credentials::resolver::CredentialResolver;
use crate::errors::ServiceError;
use crate::helpers::task::LoopHandle;
use crate::observability::metrics::get_metrics;
use crate::store::token_store::TokenStore;

/// What asked for a renewal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalTrigger {
    Startup,
    Scheduled,
    /// upstream answered 401
    Rejected,
}

impl RenewalTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalTrigger::Startup => "startup",
            RenewalTrigger::Scheduled => "scheduled",
            RenewalTrigger::Rejected => "rejected",
        }
    }
}

/// Header value for upstream calls plus the token generation it was cut from.
#[derive(Debug, Clone)]
pub struct AuthHeader {
    pub value: String,
    pub generation: u64,
}

#[derive(Default)]
struct Held {
    record: Option<TokenRecord>,
    /// bumped on every install
    generation: u64,
}

/// How a refresh-loop wait ended
enum Wake {
    Elapsed,
    Installed,
    Cancelled,
}

/// Owns the current token and keeps it fresh.
///
/// Renewals are single-flight: triggers queue on `renewal` and carry the
/// generation they observed. A trigger that finds a newer generation once it
/// holds the lock reuses that token instead of calling the token endpoint again.
/// Every install is published on `installed`; the refresh loop reschedules
/// from it, so an out-of-band renewal pushes the next scheduled one back.
pub struct TokenManager {
    cfg: TokenConfig,
    oauth: OAuth2Client,
    resolver: Arc<CredentialResolver>,
    store: TokenStore,
    held: RwLock<Held>,
    renewal: Mutex<()>,
    installed: watch::Sender<u64>,
    refresh_loop: Mutex<Option<LoopHandle>>,
    shutdown: CancellationToken,
}

impl TokenManager {
    pub fn new(
        cfg: TokenConfig,
        oauth: OAuth2Client,
        resolver: Arc<CredentialResolver>,
        store: TokenStore,
        shutdown: CancellationToken,
    ) -> Self {
        let (installed, _) = watch::channel(0);
        Self {
            cfg,
            oauth,
            resolver,
            store,
            held: RwLock::new(Held::default()),
            renewal: Mutex::new(()),
            installed,
            refresh_loop: Mutex::new(None),
            shutdown,
        }
    }

    fn buffer(&self) -> Duration {
        Duration::from_secs(self.cfg.refresh_buffer_seconds)
    }

    /// Adopts a stored token when it is still fresh, otherwise authenticates.
    /// Starts the refresh loop either way so a failed start can recover.
    pub async fn initialize(self: &Arc<Self>) -> bool {
        info!("initializing authentication ...");

        let saved = match self.store.load().await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("could not load stored token: {:#}", e);
                None
            }
        };

        let authenticated = match saved.filter(|t| !t.is_stale(self.buffer())) {
            Some(record) => {
                info!("valid stored token found, expires at {}", record.expires_at);
                self.install(record, false).await;
                true
            }
            None => {
                let observed = self.generation().await;
                match self.renew(observed, RenewalTrigger::Startup).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!("token request failed: {:#}", e);
                        false
                    }
                }
            }
        };

        self.start_refresh_loop().await;
        authenticated
    }

    /// Held and outside the staleness buffer.
    pub async fn is_authenticated(&self) -> bool {
        let held = self.held.read().await;
        held.record.as_ref().is_some_and(|t| !t.is_stale(self.buffer()))
    }

    pub async fn generation(&self) -> u64 {
        self.held.read().await.generation
    }

    /// Waits until a token has been installed at least once.
    /// Returns `false` if `cancel` fires first.
    pub async fn wait_authenticated(&self, cancel: &CancellationToken) -> bool {
        let mut installs = self.installed.subscribe();
        tokio::select! {
            installed = installs.wait_for(|generation| *generation > 0) => installed.is_ok(),
            _ = cancel.cancelled() => false,
        }
    }

    /// `NotAuthenticated` unless an unexpired token is held.
    pub async fn current_auth_header(&self) -> Result<AuthHeader, ServiceError> {
        let held = self.held.read().await;
        match held.record.as_ref().filter(|t| !t.is_expired()) {
            Some(record) => Ok(AuthHeader { value: record.header_value(), generation: held.generation }),
            None => Err(ServiceError::NotAuthenticated),
        }
    }

    /// Renews unless a newer token than `observed_generation` was installed
    /// while this call waited for the renewal lock.
    pub async fn renew(&self, observed_generation: u64, trigger: RenewalTrigger) -> Result<AuthHeader> {
        let _single_flight = self.renewal.lock().await;
        let metrics = get_metrics().await;

        let refresh_token = {
            let held = self.held.read().await;
            if held.generation != observed_generation {
                if let Some(record) = held.record.as_ref().filter(|t| !t.is_expired()) {
                    debug!(trigger = trigger.as_str(), "renewal already done by a concurrent trigger");
                    metrics.token_renewals.with_label_values(&[trigger.as_str(), "skipped"]).inc();
                    return Ok(AuthHeader { value: record.header_value(), generation: held.generation });
                }
            }
            held.record.as_ref().and_then(|t| t.refresh_token.to_owned())
        };

        match self.request_new_token(refresh_token.as_deref()).await {
            Ok(record) => {
                metrics.token_renewals.with_label_values(&[trigger.as_str(), "success"]).inc();
                info!(trigger = trigger.as_str(), "token renewed, valid until {}", record.expires_at);
                Ok(self.install(record, true).await)
            }
            Err(e) => {
                metrics.token_renewals.with_label_values(&[trigger.as_str(), "failure"]).inc();
                Err(e)
            }
        }
    }

    /// Out-of-band renewal after an authentication rejection.
    pub async fn force_renewal(&self, observed_generation: u64) -> Result<AuthHeader> {
        warn!("upstream rejected token generation {}, forcing renewal", observed_generation);
        self.renew(observed_generation, RenewalTrigger::Rejected).await
    }

    /// Refresh-token grant when one is held, falling back to client credentials.
    pub async fn request_new_token(&self, refresh_token: Option<&str>) -> Result<TokenRecord> {
        let credentials = self.resolver.resolve(false).await?;

        if let Some(refresh_token) = refresh_token {
            match self.oauth.refresh(&credentials, refresh_token).await {
                Ok(record) => return Ok(record),
                Err(e) => warn!("refresh_token grant failed, using client_credentials: {:#}", e),
            }
        }
        self.oauth.client_credentials(&credentials).await
    }

    async fn install(&self, record: TokenRecord, persist: bool) -> AuthHeader {
        if persist {
            if let Err(e) = self.store.save(&record).await {
                warn!("token renewed but could not be persisted: {:#}", e);
            }
        }
        get_metrics().await.token_expiry_unix.set(record.expires_at.timestamp());

        let mut held = self.held.write().await;
        held.generation += 1;
        let header = AuthHeader { value: record.header_value(), generation: held.generation };
        held.record = Some(record);
        self.installed.send_replace(held.generation);
        header
    }

    /// No-op while a loop is already running.
    pub async fn start_refresh_loop(self: &Arc<Self>) {
        let mut slot = self.refresh_loop.lock().await;
        if slot.as_ref().is_some_and(|h| h.is_running()) {
            debug!("token refresh loop already running");
            return;
        }
        let manager = Arc::clone(self);
        *slot = Some(LoopHandle::spawn("token refresh", &self.shutdown, move |cancel| {
            manager.refresh_loop(cancel)
        }));
    }

    async fn refresh_loop(self: Arc<Self>, cancel: CancellationToken) {
        let min_interval = Duration::from_secs(self.cfg.min_refresh_interval_seconds);
        let backoff = Duration::from_secs(self.cfg.retry_backoff_seconds);
        let mut installs = self.installed.subscribe();

        loop {
            installs.borrow_and_update();
            let (expires_at, observed) = {
                let held = self.held.read().await;
                (held.record.as_ref().map(|t| t.expires_at), held.generation)
            };
            let sleep = match expires_at {
                Some(expires_at) => refresh_sleep(expires_at, Utc::now(), self.buffer(), min_interval),
                None => backoff,
            };
            debug!("next token refresh in {}s", sleep.as_secs());
            match Self::wait(sleep, &mut installs, &cancel).await {
                Wake::Elapsed => {}
                Wake::Installed => {
                    debug!("token replaced out of band, rescheduling refresh");
                    continue;
                }
                Wake::Cancelled => break,
            }

            let result = tokio::select! {
                result = self.renew(observed, RenewalTrigger::Scheduled) => result,
                _ = cancel.cancelled() => break,
            };
            if let Err(e) = result {
                error!("scheduled token refresh failed: {:#}", e);
                installs.borrow_and_update();
                if let Wake::Cancelled = Self::wait(backoff, &mut installs, &cancel).await {
                    break;
                }
            }
        }
        info!("token refresh loop finished");
    }

    async fn wait(duration: Duration, installs: &mut watch::Receiver<u64>, cancel: &CancellationToken) -> Wake {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Wake::Elapsed,
            changed = installs.changed() => match changed {
                Ok(()) => Wake::Installed,
                Err(_) => Wake::Cancelled,
            },
            _ = cancel.cancelled() => Wake::Cancelled,
        }
    }

    pub async fn status(&self) -> TokenStatus {
        let running = self.refresh_loop.lock().await.as_ref().is_some_and(|h| h.is_running());
        let held = self.held.read().await;
        let now = Utc::now();
        TokenStatus {
            authenticated: held.record.as_ref().is_some_and(|t| !t.is_stale_at(now, self.buffer())),
            expires_at: held.record.as_ref().map(|t| t.expires_at),
            expires_in_seconds: held.record.as_ref().map(|t| t.seconds_until_expiry(now)),
            has_refresh_token: held.record.as_ref().is_some_and(|t| t.refresh_token.is_some()),
            refresh_loop_running: running,
            generation: held.generation,
        }
    }

    pub async fn shutdown(&self, timeout: Duration) {
        if let Some(handle) = self.refresh_loop.lock().await.take() {
            handle.stop(timeout).await;
        }
        info!("token manager shut down");
    }
}
