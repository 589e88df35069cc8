use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// Error taxonomy shared by the booking handlers. Every variant carries a
/// stable machine-readable code surfaced both in the JSON body and in the
/// `X-Error-Code` response header consumed by the error-metrics middleware.
#[derive(Debug)]
pub enum ApiError {
    /// Resource or booking row absent (404).
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    /// State-machine or inventory conflict: sold out, already booked,
    /// already cancelled, or a commit-time serialization failure (409).
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    /// Caller does not own the booking it is acting on (403).
    Forbidden { trace_id: Option<Uuid> },
    /// Row lock not acquired within the bounded wait; transient, the
    /// client may retry (503).
    Busy { code: &'static str, trace_id: Option<Uuid> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        Self::Internal { trace_id, message: Some(e.to_string()) }
    }
    pub fn not_found(code: &'static str) -> Self {
        Self::NotFound { code, trace_id: None }
    }
    pub fn conflict(code: &'static str) -> Self {
        Self::Conflict { code, trace_id: None, message: None }
    }
    pub fn busy(code: &'static str) -> Self {
        Self::Busy { code, trace_id: None }
    }
    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code, trace_id, message: None }
    }

    /// Stable code for metrics labels; mirrors what `X-Error-Code` carries.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound { code, .. } => code,
            ApiError::Conflict { code, .. } => code,
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::Busy { code, .. } => code,
            ApiError::BadRequest { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::NotFound { code, trace_id } => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: code.into(), trace_id, message: None },
                code,
            ),
            ApiError::Conflict { code, trace_id, message } => (
                StatusCode::CONFLICT,
                ErrorBody { code: code.into(), trace_id, message },
                code,
            ),
            ApiError::Forbidden { trace_id } => (
                StatusCode::FORBIDDEN,
                ErrorBody { code: "forbidden".into(), trace_id, message: None },
                "forbidden",
            ),
            ApiError::Busy { code, trace_id } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody { code: code.into(), trace_id, message: None },
                code,
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), trace_id, message },
                code,
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "internal_error".into(), trace_id, message },
                "internal_error",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
