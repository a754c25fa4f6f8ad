use crate::domain::{FileService, OnboardingService};
use crate::http::{ApiError, TraceId};
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::Json;
use common::domain::{DomainError, DomainResult, Onboarding, OnboardingFile, PoolStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub onboarding_service: Arc<OnboardingService>,
    pub file_service: Arc<FileService>,
    pub info: Arc<InfoPod>,
    /// Per-request deadline for service calls
    pub ctx_timeout: Duration,
}

/// Static process information served at `/info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoPod {
    pub pod_name: String,
    pub api_version: String,
    pub os_pid: u32,
    pub ip_address: String,
    pub availability_zone: String,
    pub env: String,
    pub server: ServerInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
    pub ctx_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

/// Request-scoped values served at `/context`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub ctx_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn ok() -> Self {
        Self {
            message: "true".to_string(),
        }
    }
}

async fn with_deadline<T>(
    timeout: Duration,
    future: impl Future<Output = DomainResult<T>>,
) -> DomainResult<T> {
    tokio::time::timeout(timeout, future).await?
}

fn decode_body(
    payload: Result<Json<Onboarding>, JsonRejection>,
    trace_id: &TraceId,
) -> Result<Onboarding, ApiError> {
    payload
        .map(|Json(input)| input)
        .map_err(|e| trace_id.error(DomainError::UnmarshalFailed(e.body_text())))
}

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::ok())
}

pub async fn live() -> Json<MessageResponse> {
    Json(MessageResponse::ok())
}

pub async fn info(State(state): State<AppState>) -> Json<InfoPod> {
    Json(state.info.as_ref().clone())
}

/// Echoes the request headers, grouping repeated names
pub async fn header(headers: HeaderMap) -> Json<BTreeMap<String, Vec<String>>> {
    let mut echoed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        echoed
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(echoed)
}

pub async fn context(
    State(state): State<AppState>,
    TraceId(request_id): TraceId,
    method: Method,
    uri: Uri,
) -> Json<RequestContext> {
    Json(RequestContext {
        request_id,
        method: method.to_string(),
        path: uri.path().to_string(),
        ctx_timeout_ms: u64::try_from(state.ctx_timeout.as_millis()).unwrap_or(u64::MAX),
    })
}

pub async fn stat(State(state): State<AppState>) -> Json<PoolStats> {
    Json(state.onboarding_service.stat())
}

pub async fn add_person(
    State(state): State<AppState>,
    trace_id: TraceId,
    payload: Result<Json<Onboarding>, JsonRejection>,
) -> Result<Json<Onboarding>, ApiError> {
    let input = decode_body(payload, &trace_id)?;
    debug!(person_id = %input.person.person_id, "add person request");

    with_deadline(
        state.ctx_timeout,
        state.onboarding_service.add_person(input),
    )
    .await
    .map(Json)
    .map_err(|e| trace_id.error(e))
}

pub async fn get_person(
    State(state): State<AppState>,
    trace_id: TraceId,
    Path(id): Path<String>,
) -> Result<Json<Onboarding>, ApiError> {
    with_deadline(state.ctx_timeout, state.onboarding_service.get_person(id))
        .await
        .map(Json)
        .map_err(|e| trace_id.error(e))
}

pub async fn update_person(
    State(state): State<AppState>,
    trace_id: TraceId,
    payload: Result<Json<Onboarding>, JsonRejection>,
) -> Result<Json<Onboarding>, ApiError> {
    let input = decode_body(payload, &trace_id)?;
    debug!(person_id = %input.person.person_id, "update person request");

    with_deadline(
        state.ctx_timeout,
        state.onboarding_service.update_person(input),
    )
    .await
    .map(Json)
    .map_err(|e| trace_id.error(e))
}

pub async fn list_person(
    State(state): State<AppState>,
    trace_id: TraceId,
    Path(id): Path<String>,
) -> Result<Json<Vec<Onboarding>>, ApiError> {
    with_deadline(state.ctx_timeout, state.onboarding_service.list_person(id))
        .await
        .map(Json)
        .map_err(|e| trace_id.error(e))
}

/// Stores the multipart field `file` in the object store
pub async fn upload_file(
    State(state): State<AppState>,
    trace_id: TraceId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|e| trace_id.error(DomainError::InvalidData(e.body_text())))?;
    let file = read_form_file(&mut multipart)
        .await
        .map_err(|e| trace_id.error(e))?;

    with_deadline(state.ctx_timeout, state.file_service.upload_file(file))
        .await
        .map_err(|e| trace_id.error(e))?;

    Ok(Json(MessageResponse::ok()))
}

async fn read_form_file(multipart: &mut Multipart) -> DomainResult<OnboardingFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DomainError::InvalidData(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| DomainError::InvalidData(e.to_string()))?;

        return Ok(OnboardingFile {
            file_name,
            content,
            ..Default::default()
        });
    }

    Err(DomainError::InvalidData(
        "multipart field 'file' is missing".to_string(),
    ))
}
