use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token lifecycle
    pub token_renewals: IntCounterVec,
    pub token_expiry_unix: IntGauge,

    // Credential resolution
    pub credential_resolutions: IntCounterVec,
    pub decryption_failures: IntCounter,

    // Upstream gateway
    pub upstream_requests: IntCounterVec,
    pub upstream_duration: HistogramVec,

    // Cache orchestrator
    pub cache_refreshes: IntCounterVec,
    pub cache_last_success_unix: IntGaugeVec,

    // Health / runtime
    pub health_check_up: IntGauge,
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        // metric names and label sets are literals; construction cannot fail
        let registry = Registry::new_custom(Some("parkfeed".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Token
            token_renewals: IntCounterVec::new(Opts::new("token_renewals_total", "Token renewals by trigger and outcome"), &["trigger", "outcome"]).unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the current access token").unwrap(),

            // Credentials
            credential_resolutions: IntCounterVec::new(Opts::new("credential_resolutions_total", "Credential bundle resolutions by source"), &["source"]).unwrap(),
            decryption_failures: IntCounter::new("decryption_failures_total", "Remote config entries that failed to decrypt").unwrap(),

            // Upstream
            upstream_requests: IntCounterVec::new(Opts::new("upstream_requests_total", "Upstream API requests by endpoint and status"), &["endpoint", "status"]).unwrap(),
            upstream_duration: HistogramVec::new(HistogramOpts::new("upstream_request_duration_seconds", "Upstream request duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]), &["endpoint"]).unwrap(),

            // Cache
            cache_refreshes: IntCounterVec::new(Opts::new("cache_refresh_total", "Dataset refresh attempts by outcome"), &["dataset", "outcome"]).unwrap(),
            cache_last_success_unix: IntGaugeVec::new(Opts::new("cache_last_success_unix_seconds", "Last successful refresh per dataset"), &["dataset"]).unwrap(),

            // Health / runtime
            health_check_up: IntGauge::new("health_check_up", "1 if the last remote health check passed").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if service is serving").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_renewals.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.credential_resolutions.clone())).unwrap();
        reg.register(Box::new(metrics.decryption_failures.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_requests.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cache_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.cache_last_success_unix.clone())).unwrap();
        reg.register(Box::new(metrics.health_check_up.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
