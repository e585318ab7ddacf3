use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tokio::net::ToSocketAddrs;

use crate::gate::Gate;
use crate::persistence::{ReachabilityRecord, ReachabilityStore};
use crate::reachability::{PingReport, ReachabilityBatch};

mod error;
mod models;

pub use error::ApiError;
pub use models::{AddResponse, ErrorResponse};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const REAL_IP_HEADER: &str = "X-Real-IP";
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Identifies the client for rate limiting: `X-Real-IP`, else the first
/// `X-Forwarded-For` hop, else the peer address.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    header(headers, REAL_IP_HEADER)
        .or_else(|| {
            header(headers, FORWARDED_FOR_HEADER)
                .and_then(|hops| hops.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
        })
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

async fn admit(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer);
    gate.admit(&client, header(request.headers(), API_KEY_HEADER))?;

    Ok(next.run(request).await)
}

async fn deadline(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    tokio::time::timeout(limit, next.run(request))
        .await
        .map_err(|_| {
            log::warn!("Request not handled within {:?}", limit);
            ApiError::Timeout(limit)
        })
}

async fn add_containers<S: ReachabilityStore>(
    State(store): State<Arc<S>>,
    body: Bytes,
) -> Result<Json<AddResponse>, ApiError> {
    let batch = ReachabilityBatch::from_slice(&body)
        .and_then(|batch| batch.validate())
        .inspect_err(|err| log::debug!("Rejecting batch: {}", err))?;
    for rejected in &batch.rejected {
        log::warn!("skipping report #{}: {}", rejected.index, rejected.error);
    }

    let skipped = batch.rejected.len();
    let mut stored = 0;
    for result in batch.results {
        let record = ReachabilityRecord::from(result);
        store
            .upsert(&record)
            .await
            .inspect_err(|err| log::error!("Failed to add container: {}", err))?;
        stored += 1;
    }
    log::debug!("Added {} containers, skipped {}", stored, skipped);

    Ok(Json(AddResponse::success(stored, skipped)))
}

async fn get_all<S: ReachabilityStore>(
    State(store): State<Arc<S>>,
) -> Result<Json<Vec<PingReport>>, ApiError> {
    let records = store
        .get_all()
        .await
        .inspect_err(|err| log::error!("Failed to query containers: {}", err))?;

    Ok(Json(records.iter().map(PingReport::from).collect()))
}

/// Builds the ingress routes. Every route sits behind `gate`, and behind
/// `request_timeout` when set.
pub fn router<S: ReachabilityStore + 'static>(
    store: Arc<S>,
    gate: Arc<Gate>,
    request_timeout: Option<Duration>,
) -> axum::Router {
    let router = axum::Router::new()
        .route("/container/add", post(add_containers::<S>))
        .route("/container/getall", get(get_all::<S>).post(get_all::<S>))
        .with_state(store)
        .layer(middleware::from_fn_with_state(gate, admit));
    match request_timeout {
        Some(limit) => router.layer(middleware::from_fn_with_state(limit, deadline)),
        None => router,
    }
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new<S: ReachabilityStore + 'static>(
        store: Arc<S>,
        gate: Gate,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            router: router(store, Arc::new(gate), request_timeout),
        }
    }

    /// Serves the ingress on `addr` until `shutdown` resolves, then drains
    /// in-flight requests.
    pub async fn listen(
        self,
        addr: impl ToSocketAddrs,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Listening on {}", listener.local_addr()?);
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ApiKeys, RateLimiter};
    use crate::persistence::{self, MemoryStore};
    use axum::body::{self, Body};
    use axum::http::{self, StatusCode};
    use tower::ServiceExt;

    const SAMPLE: &str = r#"{"containers":[{"ip_address":"192.168.1.1","is_reachable":true,"last_ping":"2024-01-01 00:00:00","packer_lost":0}]}"#;

    fn app_with_limit(store: Arc<MemoryStore>, limit: u32) -> axum::Router {
        let gate = Gate::new(
            ApiKeys::new(["secret"]),
            RateLimiter::new(limit, Duration::from_secs(60)),
        );
        router(store, Arc::new(gate), Some(Duration::from_secs(5)))
    }

    fn app(store: Arc<MemoryStore>) -> axum::Router {
        app_with_limit(store, 100)
    }

    fn request(uri: &str, key: Option<&str>, body: &str) -> http::Request<Body> {
        let mut builder = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(REAL_IP_HEADER, "10.1.1.1");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_getall() {
        let store = Arc::new(MemoryStore::new());
        let app = app(Arc::clone(&store));

        let response = app
            .clone()
            .oneshot(request("/container/add", Some("secret"), SAMPLE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let added: AddResponse = json_body(response).await;
        assert_eq!(added, AddResponse::success(1, 0));

        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/container/getall")
                    .header(API_KEY_HEADER, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let records: Vec<PingReport> = json_body(response).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip_address, "192.168.1.1");
        assert!(records[0].is_reachable);
        assert_eq!(records[0].last_ping, "2024-01-01 00:00:00");
    }

    #[tokio::test]
    async fn test_getall_accepts_post() {
        let app = app(Arc::new(MemoryStore::new()));
        let response = app
            .oneshot(request("/container/getall", Some("secret"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let records: Vec<PingReport> = json_body(response).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_unknown_key_is_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let app = app_with_limit(Arc::clone(&store), 1);

        for key in [None, Some("wrong"), None] {
            let response = app
                .clone()
                .oneshot(request("/container/add", key, SAMPLE))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let error: ErrorResponse = json_body(response).await;
            assert_eq!(error.error_message, "invalid request");
        }
        assert!(store.get("192.168.1.1").is_none());

        let response = app
            .clone()
            .oneshot(request("/container/add", Some("secret"), SAMPLE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("/container/add", Some("wrong"), SAMPLE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rate_limited_per_client() {
        let app = app_with_limit(Arc::new(MemoryStore::new()), 2);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request("/container/getall", Some("secret"), ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .clone()
            .oneshot(request("/container/getall", Some("secret"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.error_message, "server is busy");

        let other_client = http::Request::builder()
            .uri("/container/getall")
            .header(API_KEY_HEADER, "secret")
            .header(FORWARDED_FOR_HEADER, "10.2.2.2, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(other_client).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_batch_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let app = app(Arc::clone(&store));

        let bodies = [
            r#"{"containers":[{"ip_address":"","is_reachable":true,"last_ping":"","packer_lost":0}]}"#,
            r#"{"containers":[]}"#,
            r#"{"containers":[{"ip_address":"10.0.0.1.10.0.0.1.10.0.0.1.10.0.0.1.10.0.0.1.10.0.0.1","is_reachable":true,"last_ping":"2024-01-01 00:00:00"}]}"#,
            "not json",
        ];
        for body in bodies {
            let response = app
                .clone()
                .oneshot(request("/container/add", Some("secret"), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let error: ErrorResponse = json_body(response).await;
            assert_eq!(error.error_message, "invalid request");
        }
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partially_valid_batch_reports_skipped() {
        let store = Arc::new(MemoryStore::new());
        let app = app(Arc::clone(&store));
        let body = r#"{"containers":[
            {"ip_address":"","is_reachable":true,"last_ping":"2024-01-01 00:00:00"},
            {"ip_address":"10.0.0.7","is_reachable":false,"last_ping":"2024-01-01 00:00:00","packer_lost":1}
        ]}"#;

        let response = app
            .oneshot(request("/container/add", Some("secret"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let added: AddResponse = json_body(response).await;
        assert_eq!(added, AddResponse::success(1, 1));
        assert!(!store.get("10.0.0.7").unwrap().is_reachable);
    }

    struct BrokenStore;

    impl ReachabilityStore for BrokenStore {
        async fn upsert(&self, record: &ReachabilityRecord) -> persistence::Result<String> {
            Err(persistence::Error::UpsertError {
                ip: record.ip_address.clone(),
                source: sqlx::Error::PoolTimedOut,
            })
        }

        async fn get_all(&self) -> persistence::Result<Vec<ReachabilityRecord>> {
            Err(persistence::Error::ReadError(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let gate = Gate::new(ApiKeys::disabled(), RateLimiter::new(0, Duration::from_secs(1)));
        let app = router(Arc::new(BrokenStore), Arc::new(gate), None);

        let response = app
            .clone()
            .oneshot(request("/container/add", None, SAMPLE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.error_message, "internal error");

        let response = app
            .oneshot(request("/container/getall", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    struct SlowStore;

    impl ReachabilityStore for SlowStore {
        async fn upsert(&self, record: &ReachabilityRecord) -> persistence::Result<String> {
            Ok(record.ip_address.clone())
        }

        async fn get_all(&self) -> persistence::Result<Vec<ReachabilityRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_times_out() {
        let gate = Gate::new(ApiKeys::disabled(), RateLimiter::new(0, Duration::from_secs(1)));
        let app = router(
            Arc::new(SlowStore),
            Arc::new(gate),
            Some(Duration::from_secs(2)),
        );

        let start = tokio::time::Instant::now();
        let response = app
            .clone()
            .oneshot(request("/container/getall", None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(start.elapsed() < Duration::from_secs(60));
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.error_message, "request timed out");

        let response = app
            .oneshot(request("/container/add", None, SAMPLE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_client_key() {
        let peer: SocketAddr = "172.20.0.9:51234".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, None), "unknown");
        assert_eq!(client_key(&headers, Some(peer)), "172.20.0.9");

        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.1");

        headers.insert("x-real-ip", "10.9.9.9".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer)), "10.9.9.9");
    }
}
