//! Outbound SIP trunk handlers.

use axum::{extract::Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{envelope, run_blocking, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use switchboard_store::{self as store, CreateTrunkParams};
use switchboard_voice::OutboundTrunkSpec;

/// Request body for trunk creation.
#[derive(Debug, Deserialize)]
pub struct CreateTrunkRequest {
    pub trunk_name: String,
    pub trunk_address: String,
    pub trunk_numbers: Vec<String>,
    pub trunk_auth_username: String,
    pub trunk_auth_password: String,
    pub trunk_type: String,
}

/// Handler for `POST /sip/create-outbound-trunk`.
///
/// The trunk is created on the voice platform first; only a successful
/// platform call is recorded locally, so the table never holds a trunk ID
/// the platform does not know about.
pub async fn create_trunk_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Json(payload): Json<CreateTrunkRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.trunk_type != "twilio" {
        return Err(ApiError::BadRequest(
            "Trunk type not supported. Only 'twilio' is supported.".to_string(),
        ));
    }
    if payload.trunk_name.trim().is_empty() {
        return Err(ApiError::BadRequest("trunk_name is required".to_string()));
    }
    if payload.trunk_address.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "trunk_address is required".to_string(),
        ));
    }
    if payload.trunk_numbers.is_empty()
        || payload.trunk_numbers.iter().any(|n| n.trim().is_empty())
    {
        return Err(ApiError::BadRequest(
            "trunk_numbers must be a non-empty list of phone numbers".to_string(),
        ));
    }

    let trunk_id = state
        .voice
        .create_sip_outbound_trunk(&OutboundTrunkSpec {
            name: payload.trunk_name.clone(),
            address: payload.trunk_address,
            numbers: payload.trunk_numbers,
            auth_username: payload.trunk_auth_username,
            auth_password: payload.trunk_auth_password,
        })
        .await?;

    let params = CreateTrunkParams {
        trunk_id,
        trunk_name: payload.trunk_name,
        created_by_email: key.user_email,
    };
    let trunk = run_blocking(move || {
        let conn = state.pool.get()?;
        Ok(store::create_trunk(&conn, &params)?)
    })
    .await?;

    Ok(envelope(
        "Outbound trunk created successfully",
        json!({
            "trunk_id": trunk.trunk_id,
            "trunk_name": trunk.trunk_name,
            "created_by_email": trunk.created_by_email,
            "created_at": trunk.created_at,
        }),
    ))
}

/// Handler for `GET /sip/list`.
pub async fn list_trunks_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let trunks = run_blocking(move || {
        let conn = state.pool.get()?;
        Ok(store::list_trunks(&conn, &key.user_email)?)
    })
    .await?;

    Ok(envelope("Outbound trunks fetched successfully", trunks))
}
