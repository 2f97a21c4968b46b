//! API key issuance and verification handlers.

use axum::{extract::Extension, Json};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{envelope, run_blocking, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use switchboard_store::{create_api_key, CreateApiKeyParams, StoreError};

/// Request body for key issuance.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub user_name: String,
    #[serde(default)]
    pub org_name: Option<String>,
    pub user_email: String,
}

/// Mints a bearer credential: `sb_` plus 32 random bytes in URL-safe base64.
fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("sb_{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Handler for `POST /auth/create-key`.
pub async fn create_key_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateKeyRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.user_name.trim().is_empty() {
        return Err(ApiError::BadRequest("user_name is required".to_string()));
    }
    let email = payload.user_email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest(
            "A valid user_email is required".to_string(),
        ));
    }

    let params = CreateApiKeyParams {
        api_key: generate_api_key(),
        user_name: payload.user_name.trim().to_string(),
        org_name: payload.org_name,
        user_email: email.to_string(),
    };
    let key = run_blocking(move || {
        let conn = state.pool.get()?;
        create_api_key(&conn, &params).map_err(|e| match e {
            StoreError::Conflict(_) => {
                ApiError::BadRequest("User with this email already exists".to_string())
            }
            other => other.into(),
        })
    })
    .await?;

    Ok(envelope(
        "API key created successfully",
        json!({
            "api_key": key.api_key,
            "user_name": key.user_name,
            "org_name": key.org_name,
            "user_email": key.user_email,
            "created_at": key.created_at,
        }),
    ))
}

/// Handler for `GET /auth/check-key`. The middleware already resolved the
/// key, so this just echoes who the caller is.
pub async fn check_key_handler(
    Extension(CurrentUser(key)): Extension<CurrentUser>,
) -> Json<Value> {
    envelope(
        "API key is valid",
        json!({
            "user_name": key.user_name,
            "org_name": key.org_name,
            "user_email": key.user_email,
            "created_at": key.created_at,
        }),
    )
}
