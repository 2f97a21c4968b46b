//! Assistant CRUD handlers.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{envelope, run_blocking, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use switchboard_store::{
    self as store, Assistant, CreateAssistantParams, StoreError, UpdateAssistantParams,
};
use switchboard_types::TtsProvider;

/// Request body for assistant creation.
#[derive(Debug, Deserialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub prompt: String,
    pub tts_provider: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub start_instruction: Option<String>,
    #[serde(default)]
    pub end_call_url: Option<String>,
}

/// Request body for a partial assistant update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAssistantRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tts_provider: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub start_instruction: Option<String>,
    #[serde(default)]
    pub end_call_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_provider(s: &str) -> Result<TtsProvider, ApiError> {
    TtsProvider::parse(s).ok_or_else(|| {
        ApiError::BadRequest("tts_provider must be 'cartesia' or 'sarvam'".to_string())
    })
}

/// Exactly one voice selector must be set, and it must be the provider's own.
fn validate_tts_selection(
    provider: TtsProvider,
    voice_id: &Option<String>,
    speaker: &Option<String>,
) -> Result<(), ApiError> {
    match provider {
        TtsProvider::Cartesia => {
            if voice_id.is_none() {
                return Err(ApiError::BadRequest(
                    "voice_id is required when tts_provider is 'cartesia'".to_string(),
                ));
            }
            if speaker.is_some() {
                return Err(ApiError::BadRequest(
                    "speaker is not allowed when tts_provider is 'cartesia'".to_string(),
                ));
            }
        }
        TtsProvider::Sarvam => {
            if speaker.is_none() {
                return Err(ApiError::BadRequest(
                    "speaker is required when tts_provider is 'sarvam'".to_string(),
                ));
            }
            if voice_id.is_some() {
                return Err(ApiError::BadRequest(
                    "voice_id is not allowed when tts_provider is 'sarvam'".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// The details shape shared by create, update and details responses:
/// the full record minus the internal row id, plus attachment ids.
fn assistant_data(assistant: &Assistant, tool_ids: &[String]) -> Value {
    json!({
        "assistant_id": assistant.assistant_id,
        "name": assistant.name,
        "description": assistant.description,
        "tts_provider": assistant.tts_provider,
        "voice_id": assistant.voice_id,
        "speaker": assistant.speaker,
        "prompt": assistant.prompt,
        "start_instruction": assistant.start_instruction,
        "end_call_url": assistant.end_call_url,
        "tool_ids": tool_ids,
        "created_by_email": assistant.created_by_email,
        "updated_by_email": assistant.updated_by_email,
        "created_at": assistant.created_at,
        "updated_at": assistant.updated_at,
    })
}

/// Handler for `POST /assistant/create`.
pub async fn create_assistant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Json(payload): Json<CreateAssistantRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if payload.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }
    let provider = parse_provider(&payload.tts_provider)?;
    let voice_id = non_empty(payload.voice_id);
    let speaker = non_empty(payload.speaker);
    validate_tts_selection(provider, &voice_id, &speaker)?;

    let params = CreateAssistantParams {
        assistant_id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        description: payload.description,
        tts_provider: provider,
        voice_id,
        speaker,
        prompt: payload.prompt,
        start_instruction: payload.start_instruction,
        end_call_url: payload.end_call_url,
        created_by_email: key.user_email,
    };
    let assistant = run_blocking(move || {
        let conn = state.pool.get()?;
        Ok(store::create_assistant(&conn, &params)?)
    })
    .await?;

    Ok(envelope(
        "Assistant created successfully",
        assistant_data(&assistant, &[]),
    ))
}

/// Handler for `PATCH /assistant/update/{assistant_id}`.
///
/// Voice coherence is validated against the merged record: changing the
/// provider clears the old provider's selector unless the request carries a
/// replacement, and the result must still satisfy the exactly-one rule.
pub async fn update_assistant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(assistant_id): Path<String>,
    Json(payload): Json<UpdateAssistantRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_string()));
        }
    }
    if let Some(prompt) = &payload.prompt {
        if prompt.trim().is_empty() {
            return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
        }
    }
    let requested_provider = payload
        .tts_provider
        .as_deref()
        .map(parse_provider)
        .transpose()?;

    let (assistant, tool_ids) = run_blocking(move || {
        let conn = state.pool.get()?;
        let current = store::get_assistant(&conn, &assistant_id, &key.user_email)
            .map_err(assistant_not_found)?;

        let provider = requested_provider.unwrap_or(current.tts_provider);
        let provider_changed = provider != current.tts_provider;
        let voice_touched =
            requested_provider.is_some() || payload.voice_id.is_some() || payload.speaker.is_some();

        let mut params = UpdateAssistantParams {
            name: payload.name,
            description: payload.description,
            prompt: payload.prompt,
            start_instruction: payload.start_instruction,
            end_call_url: payload.end_call_url,
            ..Default::default()
        };
        if voice_touched {
            let voice_id = non_empty(payload.voice_id).or(if provider_changed {
                None
            } else {
                current.voice_id.clone()
            });
            let speaker = non_empty(payload.speaker).or(if provider_changed {
                None
            } else {
                current.speaker.clone()
            });
            validate_tts_selection(provider, &voice_id, &speaker)?;
            params.tts_provider = Some(provider);
            params.voice_id = Some(voice_id);
            params.speaker = Some(speaker);
        }

        let updated = store::update_assistant(
            &conn,
            &assistant_id,
            &key.user_email,
            &params,
            &key.user_email,
        )
        .map_err(assistant_not_found)?;
        let tool_ids = store::list_attached_tool_ids(&conn, &assistant_id)?;
        Ok((updated, tool_ids))
    })
    .await?;

    Ok(envelope(
        "Assistant updated successfully",
        assistant_data(&assistant, &tool_ids),
    ))
}

/// Handler for `GET /assistant/list`.
pub async fn list_assistants_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let assistants = run_blocking(move || {
        let conn = state.pool.get()?;
        Ok(store::list_assistants(&conn, &key.user_email)?)
    })
    .await?;

    Ok(envelope("Assistants fetched successfully", assistants))
}

/// Handler for `GET /assistant/details/{assistant_id}`.
pub async fn get_assistant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(assistant_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (assistant, tool_ids) = run_blocking(move || {
        let conn = state.pool.get()?;
        let assistant = store::get_assistant(&conn, &assistant_id, &key.user_email)
            .map_err(assistant_not_found)?;
        let tool_ids = store::list_attached_tool_ids(&conn, &assistant_id)?;
        Ok((assistant, tool_ids))
    })
    .await?;

    Ok(envelope(
        "Assistant details fetched successfully",
        assistant_data(&assistant, &tool_ids),
    ))
}

pub(crate) fn assistant_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => ApiError::NotFound("Assistant not found".to_string()),
        other => other.into(),
    }
}
