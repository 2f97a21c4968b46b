//! Outbound call initiation handler.

use axum::{extract::Extension, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::api::{envelope, run_blocking, ApiError};
use crate::api_assistant::assistant_not_found;
use crate::middleware::CurrentUser;
use crate::AppState;
use switchboard_store as store;

/// Request body for initiating an outbound call.
#[derive(Debug, Deserialize)]
pub struct OutboundCallRequest {
    pub assistant_id: String,
    pub trunk_id: String,
    pub to_number: String,
    pub call_service: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Handler for `POST /call/outbound`.
///
/// Sequence: create a room, dispatch the call worker into it, then bridge
/// the callee in through the trunk. If a later step fails the room is torn
/// down so the platform is not left holding an orphan.
pub async fn outbound_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Json(payload): Json<OutboundCallRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.call_service != "twilio" {
        return Err(ApiError::BadRequest(
            "Call service not supported. Only 'twilio' is supported.".to_string(),
        ));
    }
    if payload.to_number.trim().is_empty() {
        return Err(ApiError::BadRequest("to_number is required".to_string()));
    }

    let assistant_id = payload.assistant_id.clone();
    let db_state = Arc::clone(&state);
    let assistant = run_blocking(move || {
        let conn = db_state.pool.get()?;
        store::get_assistant(&conn, &assistant_id, &key.user_email).map_err(assistant_not_found)
    })
    .await?;

    let room = state
        .voice
        .create_call_room(&assistant.assistant_id)
        .await?;

    // Dispatch metadata: the caller's bag plus the fields the call worker
    // resolves the session from.
    let mut bag = match payload.metadata {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    bag.insert(
        "to_number".to_string(),
        Value::String(payload.to_number.clone()),
    );
    bag.insert(
        "assistant_id".to_string(),
        Value::String(assistant.assistant_id.clone()),
    );
    let metadata = Value::Object(bag).to_string();

    let dispatch_id = match state
        .voice
        .create_agent_dispatch(&room.name, metadata.clone())
        .await
    {
        Ok(id) => id,
        Err(e) => {
            abandon_room(&state, &room.name).await;
            return Err(e.into());
        }
    };

    let participant = match state
        .voice
        .create_sip_participant(&payload.trunk_id, &payload.to_number, &room.name, metadata)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            abandon_room(&state, &room.name).await;
            return Err(e.into());
        }
    };

    Ok(envelope(
        "Call initiated successfully",
        json!({
            "room_name": room.name,
            "dispatch_id": dispatch_id,
            "participant": {
                "participant_id": participant.participant_id,
                "participant_identity": participant.participant_identity,
                "sip_call_id": participant.sip_call_id,
            },
        }),
    ))
}

/// Best-effort room teardown after a failed call setup step.
async fn abandon_room(state: &AppState, room_name: &str) {
    if let Err(e) = state.voice.delete_room(room_name).await {
        tracing::warn!(
            room = room_name,
            error = %e,
            "failed to delete room after call setup failure"
        );
    }
}
