// Simulates the token endpoint and one upstream dataset endpoint that
// rejects the first N requests with 401, then checks how many renewals and
// retries the gateway issues.

#[cfg(test)]
mod test {

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use http::{HeaderMap, Method, StatusCode};
    use serde_json::{json, Value};

    use crate::errors::ServiceError;
    use crate::tests::common::{build_token_manager, spawn_axum, test_config, JoinHandle};
    use crate::upstream::datasets::Dataset;
    use crate::upstream::gateway::UpstreamGateway;

    struct Counters {
        token_calls: Arc<AtomicUsize>,
        api_calls: Arc<AtomicUsize>,
    }

    /// `reject_first` api calls answer 401, later ones echo the auth header.
    async fn spawn_upstream(reject_first: usize, api_status: StatusCode) -> (JoinHandle<()>, String, Counters) {
        let token_calls = Arc::new(AtomicUsize::new(0));
        let api_calls = Arc::new(AtomicUsize::new(0));
        let (tc, ac) = (token_calls.clone(), api_calls.clone());

        let router = Router::new()
            .route(
                "/oauth/token",
                post(move || {
                    let tc = tc.clone();
                    async move {
                        let n = tc.fetch_add(1, Ordering::SeqCst) + 1;
                        Json(json!({"access_token": format!("tok-{}", n), "expires_in": 3600, "token_type": "Bearer"}))
                    }
                }),
            )
            .route(
                "/api/v2/waiting-times",
                get(move |headers: HeaderMap| {
                    let ac = ac.clone();
                    async move {
                        let n = ac.fetch_add(1, Ordering::SeqCst);
                        if n < reject_first {
                            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"})));
                        }
                        let auth = headers
                            .get("jwtauthorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_owned();
                        (api_status, Json(json!({"waitingtimes": [{"code": 1, "time": 15}], "auth": auth})))
                    }
                }),
            );

        let (handle, addr) = spawn_axum(router).await;
        (handle, format!("http://{}", addr), Counters { token_calls, api_calls })
    }

    async fn gateway_for(base: &str) -> (UpstreamGateway, Arc<crate::auth::manager::TokenManager>) {
        let config = test_config(base, &format!("{}/oauth/token", base), &format!("{}/remote", base)).await;
        let (manager, _) = build_token_manager(&config);
        assert!(manager.initialize().await);
        let gateway = UpstreamGateway::new(&config.upstream, manager.clone()).unwrap();
        (gateway, manager)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_rejection_renews_once_and_retries_once() {
        let (server, base, counters) = spawn_upstream(1, StatusCode::OK).await;
        let (gateway, manager) = gateway_for(&base).await;
        assert_eq!(counters.token_calls.load(Ordering::SeqCst), 1);

        let payload = gateway.fetch(&Dataset::WaitTimes.default_endpoint()).await.unwrap();

        assert_eq!(counters.token_calls.load(Ordering::SeqCst), 2, "exactly one forced renewal");
        assert_eq!(counters.api_calls.load(Ordering::SeqCst), 2, "exactly one retry");
        assert_eq!(payload["auth"], "Bearer tok-2");
        assert_eq!(payload["waitingtimes"][0]["time"], 15);

        manager.shutdown(Duration::from_secs(1)).await;
        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_rejection_surfaces_upstream_error() {
        let (server, base, counters) = spawn_upstream(usize::MAX, StatusCode::OK).await;
        let (gateway, manager) = gateway_for(&base).await;

        let err = gateway.fetch(&Dataset::WaitTimes.default_endpoint()).await.unwrap_err();

        let service_err = err.downcast_ref::<ServiceError>().expect("typed error");
        assert_eq!(service_err.status(), Some(401));
        assert_eq!(counters.api_calls.load(Ordering::SeqCst), 2);
        assert_eq!(counters.token_calls.load(Ordering::SeqCst), 2);

        manager.shutdown(Duration::from_secs(1)).await;
        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn server_errors_are_not_retried() {
        let (server, base, counters) = spawn_upstream(0, StatusCode::SERVICE_UNAVAILABLE).await;
        let (gateway, manager) = gateway_for(&base).await;

        let err = gateway
            .call("/api/v2/waiting-times", Method::GET, &BTreeMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::Upstream { status: 503, .. })
        ));
        assert_eq!(counters.api_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counters.token_calls.load(Ordering::SeqCst), 1);

        manager.shutdown(Duration::from_secs(1)).await;
        server.abort();
    }

    #[tokio::test]
    async fn unauthenticated_gateway_fails_fast() {
        let config = test_config("http://127.0.0.1:9", "http://127.0.0.1:9/oauth/token", "http://127.0.0.1:9/remote").await;
        let (manager, _) = build_token_manager(&config);
        let gateway = UpstreamGateway::new(&config.upstream, manager).unwrap();

        let err = gateway.fetch(&Dataset::Seasons.default_endpoint()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ServiceError>(), Some(ServiceError::NotAuthenticated)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn query_params_are_forwarded() {
        let router = Router::new().route(
            "/api/v2/poi-group",
            get(|axum::extract::RawQuery(query): axum::extract::RawQuery| async move {
                Json(json!({"query": query}))
            }),
        )
        .route(
            "/oauth/token",
            post(|| async { Json(json!({"access_token": "tok", "expires_in": 3600})) }),
        );
        let (server, addr) = spawn_axum(router).await;
        let (gateway, manager) = gateway_for(&format!("http://{}", addr)).await;

        let payload: Value = gateway.fetch(&Dataset::PointsOfInterest.default_endpoint()).await.unwrap();
        assert_eq!(payload["query"], "status=live");

        manager.shutdown(Duration::from_secs(1)).await;
        server.abort();
    }
}
