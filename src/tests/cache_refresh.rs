#[cfg(test)]
mod test {

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use http::StatusCode;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::cache::orchestrator::CacheOrchestrator;
    use crate::store::cache_store::CacheStore;
    use crate::store::mem::MemoryStore;
    use crate::tests::common::{build_token_manager, spawn_axum, test_config, JoinHandle};
    use crate::upstream::datasets::{Cadence, Dataset};
    use crate::upstream::gateway::UpstreamGateway;

    #[derive(Clone, Default)]
    struct Switches {
        fail_wait_times: Arc<AtomicBool>,
        fail_show_times: Arc<AtomicBool>,
        wait_times_served: Arc<AtomicUsize>,
    }

    fn status_for(fail: &AtomicBool) -> StatusCode {
        if fail.load(Ordering::SeqCst) { StatusCode::INTERNAL_SERVER_ERROR } else { StatusCode::OK }
    }

    async fn spawn_park_api(switches: Switches) -> (JoinHandle<()>, String) {
        let (s1, s2) = (switches.clone(), switches.clone());
        let router = Router::new()
            .route(
                "/oauth/token",
                post(|| async { Json(json!({"access_token": "tok", "expires_in": 3600})) }),
            )
            .route(
                "/api/v2/waiting-times",
                get(move || {
                    let s = s1.clone();
                    async move {
                        let status = status_for(&s.fail_wait_times);
                        let n = s.wait_times_served.fetch_add(1, Ordering::SeqCst) + 1;
                        (status, Json(json!({"cycle": n, "waitingtimes": []})))
                    }
                }),
            )
            .route(
                "/api/v2/show-times",
                get(move || {
                    let s = s2.clone();
                    async move { (status_for(&s.fail_show_times), Json(json!({"shows": ["parade"]}))) }
                }),
            )
            .route("/api/v2/poi-group", get(|| async { Json(json!({"pois": [1, 2, 3]})) }))
            .route("/api/v2/seasons", get(|| async { (StatusCode::BAD_GATEWAY, "down") }))
            .route(
                "/api/v2/season-opentime-details/europapark",
                get(|| async { Json(json!({"opening": "09:00"})) }),
            );
        let (handle, addr) = spawn_axum(router).await;
        (handle, format!("http://{}", addr))
    }

    async fn orchestrator_for(base: &str, fast_interval: u64) -> Arc<CacheOrchestrator> {
        let mut config = test_config(base, &format!("{}/oauth/token", base), &format!("{}/remote", base)).await;
        config.cache.fast_interval_seconds = fast_interval;
        let (manager, _) = build_token_manager(&config);
        assert!(manager.initialize().await);

        let gateway = Arc::new(UpstreamGateway::new(&config.upstream, manager).unwrap());
        Arc::new(CacheOrchestrator::new(
            &config.cache,
            gateway,
            CacheStore::new(Arc::new(MemoryStore::new())),
            CancellationToken::new(),
        ))
    }

    #[test]
    fn datasets_split_by_cadence() {
        assert_eq!(Dataset::with_cadence(Cadence::Fast), vec![Dataset::WaitTimes, Dataset::ShowTimes]);
        assert_eq!(
            Dataset::with_cadence(Cadence::Slow),
            vec![Dataset::PointsOfInterest, Dataset::Seasons, Dataset::OpeningTimes]
        );
        assert_eq!("points-of-interest".parse::<Dataset>().unwrap(), Dataset::PointsOfInterest);
        assert!("pois".parse::<Dataset>().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn wait_times_survive_failures_of_other_keys() {
        let switches = Switches::default();
        switches.fail_show_times.store(true, Ordering::SeqCst);
        let (server, base) = spawn_park_api(switches.clone()).await;
        let orchestrator = orchestrator_for(&base, 300).await;

        assert!(orchestrator.load(Dataset::WaitTimes).await.unwrap().is_none());

        let outcomes = orchestrator.refresh_fast().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().find(|o| o.dataset == Dataset::WaitTimes).unwrap().is_ok());
        assert!(!outcomes.iter().find(|o| o.dataset == Dataset::ShowTimes).unwrap().is_ok());

        let first = orchestrator.load(Dataset::WaitTimes).await.unwrap().expect("wait-times cached");
        assert_eq!(first.payload["cycle"], 1);
        assert!(orchestrator.load(Dataset::ShowTimes).await.unwrap().is_none());

        // next cycle: wait-times fails, show-times recovers
        switches.fail_wait_times.store(true, Ordering::SeqCst);
        switches.fail_show_times.store(false, Ordering::SeqCst);
        orchestrator.refresh_fast().await;

        let second = orchestrator.load(Dataset::WaitTimes).await.unwrap().expect("still cached");
        assert_eq!(second, first, "failed refresh must leave the previous entry untouched");
        let shows = orchestrator.load(Dataset::ShowTimes).await.unwrap().expect("show-times cached");
        assert_eq!(shows.payload["shows"][0], "parade");

        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_cycle_isolates_failures() {
        let (server, base) = spawn_park_api(Switches::default()).await;
        let orchestrator = orchestrator_for(&base, 300).await;

        let outcomes = orchestrator.refresh_slow().await;
        let failed: Vec<Dataset> = outcomes.iter().filter(|o| !o.is_ok()).map(|o| o.dataset).collect();
        assert_eq!(failed, vec![Dataset::Seasons]);

        assert_eq!(
            orchestrator.load(Dataset::PointsOfInterest).await.unwrap().unwrap().payload["pois"][2],
            3
        );
        assert!(orchestrator.load(Dataset::OpeningTimes).await.unwrap().is_some());
        assert!(orchestrator.load(Dataset::Seasons).await.unwrap().is_none());

        let updated = orchestrator.last_updated().await;
        assert!(updated[&Dataset::OpeningTimes].is_some());
        assert!(updated[&Dataset::Seasons].is_none());
        assert!(updated[&Dataset::WaitTimes].is_none());

        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn loops_refresh_until_stopped() {
        let switches = Switches::default();
        let (server, base) = spawn_park_api(switches.clone()).await;
        let orchestrator = orchestrator_for(&base, 1).await;

        orchestrator.start().await;
        // second start is a no-op
        orchestrator.start().await;
        assert!(orchestrator.is_running().await);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(switches.wait_times_served.load(Ordering::SeqCst) >= 2);
        assert!(orchestrator.load(Dataset::WaitTimes).await.unwrap().is_some());
        assert!(orchestrator.load(Dataset::PointsOfInterest).await.unwrap().is_some());

        orchestrator.stop(Duration::from_secs(1)).await;
        assert!(!orchestrator.is_running().await);

        let served = switches.wait_times_served.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(switches.wait_times_served.load(Ordering::SeqCst), served, "no refresh after stop");

        server.abort();
    }
}
