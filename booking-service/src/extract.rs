//! Principal extraction. Identity and session issuance live upstream; the
//! gateway forwards the verified principal as an `X-User-ID` header and this
//! service trusts it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common_http_errors::ApiError;
use uuid::Uuid;

pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::BadRequest {
                code: "missing_user_id",
                trace_id: None,
                message: Some("Missing X-User-ID header".into()),
            })?;
        let user_id = Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest {
            code: "invalid_user_id",
            trace_id: None,
            message: Some("X-User-ID must be a UUID".into()),
        })?;
        Ok(AuthenticatedUser(user_id))
    }
}
