//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{extract::Request, middleware::Next, response::Response};
use readwithme_core::ports::PortError;
use tracing::debug;

use crate::error::ApiError;

/// Header set by the fronting auth layer once it has verified the caller's token.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, available to handlers as `Extension<UserId>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Middleware that extracts the verified user id from the request headers.
///
/// If present, inserts a `UserId` into request extensions for handlers to use.
/// If missing or blank, returns 401 Unauthorized.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            debug!("Rejected request to {} without a user id", req.uri().path());
            ApiError::Port(PortError::Unauthorized)
        })?;

    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
