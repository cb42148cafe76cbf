//! Caller identity.
//!
//! Authentication happens in front of the daemon; the authenticating gateway
//! forwards the verified user id in [`USER_ID_HEADER`]. The id is extracted
//! per request and handed to the core explicitly.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::api_types::ErrorResponse;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing caller identity"))?;

        Uuid::parse_str(raw.trim())
            .map(CallerId)
            .map_err(|_| unauthorized("malformed caller identity"))
    }
}

fn unauthorized(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(msg)))
}
