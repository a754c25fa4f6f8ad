use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use common::http::{HttpLoggingLayer, HttpTracingLayer, IgnoredPaths, REQUEST_ID_HEADER};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use super::handlers::{self, AppState};

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// HTTP server configuration
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on the whole request, body included
    pub read_timeout: Duration,
    pub ignored_paths: IgnoredPaths,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            read_timeout: Duration::from_secs(60),
            ignored_paths: IgnoredPaths::from_comma_separated("/health,/live"),
        }
    }
}

/// Routes plus request id, tracing, logging and timeout middleware
pub fn build_router(state: AppState, config: &HttpServerConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/live", get(handlers::live))
        .route("/info", get(handlers::info))
        .route("/header", get(handlers::header))
        .route("/context", get(handlers::context))
        .route("/stat", get(handlers::stat))
        .route("/person/add", post(handlers::add_person))
        .route("/person/update", post(handlers::update_person))
        .route("/person/list/:id", get(handlers::list_person))
        .route("/person/:id", get(handlers::get_person))
        .route(
            "/uploadFile",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    request_id_header.clone(),
                    MakeRequestUuid,
                ))
                .layer(HttpTracingLayer::new(config.ignored_paths.clone()))
                .layer(HttpLoggingLayer::new(config.ignored_paths.clone()))
                .layer(PropagateRequestIdLayer::new(request_id_header))
                .layer(TimeoutLayer::new(config.read_timeout)),
        )
}

/// Run the HTTP server until the token is cancelled
pub async fn run_onboarding_http_server(
    config: HttpServerConfig,
    state: AppState,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Starting HTTP server on {}", addr);

    let router = build_router(state, &config);
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        info!("HTTP server shutdown signal received");
    });

    match server.await {
        Ok(()) => {
            info!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("HTTP server error: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileService, OnboardingService};
    use crate::http::{ErrorBody, InfoPod, MessageResponse, RequestContext};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use common::domain::{
        DomainError, DomainResult, GetPersonInput, ListPersonInput, MockObjectStore,
        MockPersonRepository, MockUnitOfWorkProvider, ObjectStorageConfig, Onboarding,
        PersonRepository, PoolStats, UnitOfWork,
    };
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use std::any::Any;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    struct NoopUnitOfWork;

    #[async_trait]
    impl UnitOfWork for NoopUnitOfWork {
        async fn commit(self: Box<Self>) -> DomainResult<()> {
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> DomainResult<()> {
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn provider() -> MockUnitOfWorkProvider {
        let mut provider = MockUnitOfWorkProvider::new();
        provider
            .expect_begin()
            .returning(|| Ok(Box::new(NoopUnitOfWork) as Box<dyn UnitOfWork>));
        provider.expect_stat().returning(|| PoolStats {
            max_size: 10,
            size: 1,
            available: 1,
            waiting: 0,
        });
        provider
    }

    fn app(repo: MockPersonRepository, store: MockObjectStore) -> Router {
        let state = AppState {
            onboarding_service: Arc::new(OnboardingService::new(
                Arc::new(repo),
                Arc::new(provider()),
            )),
            file_service: Arc::new(FileService::new(
                Arc::new(store),
                ObjectStorageConfig {
                    bucket_name: "onboarding".to_string(),
                    file_path: "uploads".to_string(),
                },
            )),
            info: Arc::new(InfoPod {
                pod_name: "go-onboarding".to_string(),
                api_version: "0.1.0".to_string(),
                ..Default::default()
            }),
            ctx_timeout: Duration::from_secs(5),
        };
        build_router(state, &HttpServerConfig::default())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// In-memory person table behind the mocked repository
    fn in_memory_repository() -> MockPersonRepository {
        let table: Arc<Mutex<BTreeMap<String, Onboarding>>> = Arc::default();
        let mut repo = MockPersonRepository::new();

        let rows = table.clone();
        repo.expect_add_person().returning(move |_, mut input| {
            let mut rows = rows.lock().unwrap();
            input.person.id = Some(rows.len() as i32 + 1);
            input.person.created_at = Some(Utc::now());
            input.person.updated_at = None;
            rows.insert(input.person.person_id.clone(), input.clone());
            Ok(input)
        });

        let rows = table.clone();
        repo.expect_get_person().returning(move |input| {
            rows.lock()
                .unwrap()
                .get(&input.person_id)
                .cloned()
                .ok_or(DomainError::NotFound(input.person_id))
        });

        let rows = table.clone();
        repo.expect_get_person_for_update().returning(move |_, input| {
            rows.lock()
                .unwrap()
                .get(&input.person_id)
                .cloned()
                .ok_or(DomainError::NotFound(input.person_id))
        });

        let rows = table.clone();
        repo.expect_update_person().returning(move |_, input| {
            let mut rows = rows.lock().unwrap();
            match rows.get_mut(&input.person.person_id) {
                Some(stored) => {
                    input.person.updated_at = Some(Utc::now());
                    stored.person.name = input.person.name.clone();
                    stored.person.updated_at = input.person.updated_at;
                    Ok(1)
                }
                None => Err(DomainError::UpdateAffectedZeroRows(
                    input.person.person_id.clone(),
                )),
            }
        });

        let rows = table;
        repo.expect_list_person().returning(move |input| {
            Ok(rows
                .lock()
                .unwrap()
                .range(input.person_id..)
                .map(|(_, v)| v.clone())
                .collect())
        });

        repo
    }

    #[tokio::test]
    async fn test_person_lifecycle() {
        let app = app(in_memory_repository(), MockObjectStore::new());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/person/add",
                r#"{"person":{"person_id":"P1","name":"Alice","tenant_id":"T1"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let added: Onboarding = read_json(response).await;
        assert!(added.person.id.is_some());
        assert!(added.person.created_at.is_some());
        assert!(added.person.updated_at.is_none());

        let response = app.clone().oneshot(get_request("/person/P1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Onboarding = read_json(response).await;
        assert_eq!(fetched.person.name, "Alice");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/person/update",
                r#"{"person":{"person_id":"P1","name":"Alicia"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Onboarding = read_json(response).await;
        assert_eq!(updated.person.name, "Alicia");
        assert!(updated.person.updated_at.is_some());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/person/add",
                r#"{"person":{"person_id":"P2","name":"Bob","tenant_id":"T1"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get_request("/person/list/P"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<Onboarding> = read_json(response).await;
        let ids: Vec<_> = listed.iter().map(|o| o.person.person_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);

        let response = app.oneshot(get_request("/person/P9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_unknown_person_is_not_found() {
        let app = app(in_memory_repository(), MockObjectStore::new());

        let response = app
            .oneshot(json_request(
                "POST",
                "/person/update",
                r#"{"person":{"person_id":"ghost","name":"Nobody"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request_with_trace_id() {
        let app = app(MockPersonRepository::new(), MockObjectStore::new());

        let response = app
            .oneshot(json_request("POST", "/person/add", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let echoed_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap();
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.status_code, 400);
        assert!(body.msg.starts_with("unmarshal json error"));
        assert_eq!(body.trace_id, echoed_id);
    }

    #[tokio::test]
    async fn test_client_request_id_is_kept() {
        let app = app(MockPersonRepository::new(), MockObjectStore::new());

        let request = Request::builder()
            .method("POST")
            .uri("/person/add")
            .header("content-type", "application/json")
            .header(REQUEST_ID_HEADER, "req-123")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.trace_id, "req-123");
    }

    /// Repository whose reads never finish in time
    struct StalledRepository;

    #[async_trait]
    impl PersonRepository for StalledRepository {
        async fn add_person(
            &self,
            _uow: &mut (dyn UnitOfWork + 'static),
            input: Onboarding,
        ) -> DomainResult<Onboarding> {
            Ok(input)
        }

        async fn get_person(&self, input: GetPersonInput) -> DomainResult<Onboarding> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Onboarding::for_person_id(input.person_id))
        }

        async fn get_person_for_update(
            &self,
            _uow: &mut (dyn UnitOfWork + 'static),
            input: GetPersonInput,
        ) -> DomainResult<Onboarding> {
            Ok(Onboarding::for_person_id(input.person_id))
        }

        async fn update_person(
            &self,
            _uow: &mut (dyn UnitOfWork + 'static),
            _input: &mut Onboarding,
        ) -> DomainResult<u64> {
            Ok(1)
        }

        async fn list_person(&self, _input: ListPersonInput) -> DomainResult<Vec<Onboarding>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_elapsed_deadline_is_gateway_timeout() {
        let state = AppState {
            onboarding_service: Arc::new(OnboardingService::new(
                Arc::new(StalledRepository),
                Arc::new(provider()),
            )),
            file_service: Arc::new(FileService::new(
                Arc::new(MockObjectStore::new()),
                ObjectStorageConfig::default(),
            )),
            info: Arc::new(InfoPod::default()),
            ctx_timeout: Duration::from_millis(10),
        };
        let app = build_router(state, &HttpServerConfig::default());

        let response = app.oneshot(get_request("/person/P1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.status_code, 504);
        assert!(body.msg.starts_with("timeout"));
    }

    #[tokio::test]
    async fn test_upload_file() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .withf(|bucket, path, name, content| {
                bucket.to_string() == "onboarding"
                    && path.to_string() == "uploads"
                    && name.to_string() == "doc.txt"
                    && content[..] == b"hello"[..]
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let app = app(MockPersonRepository::new(), store);

        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"doc.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/uploadFile")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: MessageResponse = read_json(response).await;
        assert_eq!(body.message, "true");
    }

    #[tokio::test]
    async fn test_upload_without_form_is_bad_request() {
        let mut store = MockObjectStore::new();
        store.expect_put_object().times(0);
        let app = app(MockPersonRepository::new(), store);

        let response = app
            .oneshot(json_request("POST", "/uploadFile", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_probes_and_info() {
        let app = app(MockPersonRepository::new(), MockObjectStore::new());

        for path in ["/health", "/live"] {
            let response = app.clone().oneshot(get_request(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body: MessageResponse = read_json(response).await;
            assert_eq!(body.message, "true");
        }

        let response = app.clone().oneshot(get_request("/info")).await.unwrap();
        let info: InfoPod = read_json(response).await;
        assert_eq!(info.pod_name, "go-onboarding");

        let response = app.clone().oneshot(get_request("/stat")).await.unwrap();
        let stats: PoolStats = read_json(response).await;
        assert_eq!(stats.max_size, 10);

        let request = Request::builder()
            .uri("/header")
            .header("x-tenant", "T1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let headers: BTreeMap<String, Vec<String>> = read_json(response).await;
        assert_eq!(headers.get("x-tenant"), Some(&vec!["T1".to_string()]));
    }

    #[tokio::test]
    async fn test_context_reports_request_scope() {
        let app = app(MockPersonRepository::new(), MockObjectStore::new());

        let request = Request::builder()
            .uri("/context")
            .header(REQUEST_ID_HEADER, "req-ctx")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let context: RequestContext = read_json(response).await;
        assert_eq!(context.request_id, "req-ctx");
        assert_eq!(context.method, "GET");
        assert_eq!(context.path, "/context");
        assert_eq!(context.ctx_timeout_ms, 5000);
    }
}
