use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::DomainError;
use common::http::REQUEST_ID_HEADER;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{error, warn};

/// JSON body of every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status_code: u16,
    pub msg: String,
    pub trace_id: String,
}

/// A domain failure bound to the request that produced it
#[derive(Debug)]
pub struct ApiError {
    error: DomainError,
    trace_id: String,
}

impl ApiError {
    pub fn new(error: DomainError, trace_id: impl Into<String>) -> Self {
        Self {
            error,
            trace_id: trace_id.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.error {
            DomainError::UnmarshalFailed(_) | DomainError::InvalidData(_) => {
                StatusCode::BAD_REQUEST
            }
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = ?self.error, trace_id = %self.trace_id, "request failed");
        } else {
            warn!(error = %self.error, trace_id = %self.trace_id, "request rejected");
        }

        let body = ErrorBody {
            status_code: status.as_u16(),
            msg: self.error.to_string(),
            trace_id: self.trace_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Request id assigned by the request-id middleware, empty when absent
#[derive(Debug, Clone, Default)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn error(&self, error: DomainError) -> ApiError {
        ApiError::new(error, self.0.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let trace_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(TraceId(trace_id))
    }
}
