//! Request authentication.

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::ApiError;
use crate::AppState;
use switchboard_store::{find_active_key, ApiKey};

/// The authenticated key row, stored in request extensions for handlers.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub ApiKey);

/// Middleware authenticating requests via `Authorization: Bearer <api_key>`.
///
/// The bearer token is the issued API key itself; it is resolved to an
/// active `api_keys` row and the row is attached to the request so handlers
/// can scope queries to `user_email` without a second lookup.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Invalid or inactive API key".to_string());

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(unauthorized)?;

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("app state missing from request".to_string()))?
        .clone();

    let key = tokio::task::spawn_blocking(move || -> Result<Option<ApiKey>, ApiError> {
        let conn = state.pool.get()?;
        Ok(find_active_key(&conn, &token)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("task join error: {e}")))??
    .ok_or_else(unauthorized)?;

    req.extensions_mut().insert(CurrentUser(key));

    Ok(next.run(req).await)
}
