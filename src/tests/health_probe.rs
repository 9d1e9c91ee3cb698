#[cfg(test)]
mod test {

    use std::sync::Arc;

    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::config::schedule::HealthConfig;
    use crate::credentials::resolver::CredentialResolver;
    use crate::credentials::CredentialSource;
    use crate::health::checker::HealthChecker;
    use crate::health::scheduler::HealthScheduler;
    use crate::tests::common::test_config;

    async fn checker_answering(server: &MockServer, status: u16) -> HealthChecker {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signUp").query_param("key", "test-api-key");
                then.status(status).json_body(json!({"error": {"code": status}}));
            })
            .await;
        let cfg = HealthConfig { url: server.url("/v1/accounts:signUp"), ..HealthConfig::default() };
        HealthChecker::new(&cfg, "test-api-key").unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bad_request_counts_as_reachable() {
        let server = MockServer::start_async().await;
        let checker = checker_answering(&server, 400).await;

        assert!(!checker.status().await.is_healthy);
        let status = checker.check().await;
        assert!(status.is_healthy);
        assert!(status.last_error.is_none());
        assert!(status.response_time_ms.is_some());
        assert!(checker.status().await.last_check.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn server_error_is_unhealthy() {
        let server = MockServer::start_async().await;
        let checker = checker_answering(&server, 503).await;

        let status = checker.check().await;
        assert!(!status.is_healthy);
        assert_eq!(status.last_error.as_deref(), Some("unexpected status code: 503"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_endpoint_is_unhealthy() {
        let cfg = HealthConfig { url: "http://127.0.0.1:9/v1/accounts:signUp".to_owned(), ..HealthConfig::default() };
        let checker = HealthChecker::new(&cfg, "k").unwrap();

        let status = checker.check().await;
        assert!(!status.is_healthy);
        assert!(status.last_error.unwrap().starts_with("request error"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn daily_run_probes_then_refreshes_credentials() {
        let server = MockServer::start_async().await;
        let checker = Arc::new(checker_answering(&server, 200).await);
        // remote config is not mocked: resolution falls back
        let config = test_config("http://127.0.0.1:9", "http://127.0.0.1:9/oauth/token", &server.url("/remote")).await;
        let resolver = Arc::new(CredentialResolver::new(config.remote_config, config.fallback_credentials).unwrap());

        let scheduler = HealthScheduler::new(&HealthConfig::default(), checker.clone(), resolver.clone(), CancellationToken::new()).unwrap();
        scheduler.run_once().await.unwrap();

        assert!(checker.status().await.is_healthy);
        assert_eq!(resolver.resolve(false).await.unwrap().source, CredentialSource::Fallback);
    }
}
