//! Tool CRUD, attachment, and detachment handlers.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{envelope, run_blocking, ApiError};
use crate::api_assistant::assistant_not_found;
use crate::middleware::CurrentUser;
use crate::AppState;
use switchboard_store::{
    self as store, CreateToolParams, StoreError, Tool, UpdateToolParams,
};
use switchboard_types::{is_valid_tool_name, ToolExecutionType, ToolParameter};

/// Request body for tool creation.
#[derive(Debug, Deserialize)]
pub struct CreateToolRequest {
    pub tool_name: String,
    pub tool_description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    pub execution_type: String,
    pub execution_config: Value,
}

/// Request body for a partial tool update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateToolRequest {
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<ToolParameter>>,
    #[serde(default)]
    pub execution_type: Option<String>,
    #[serde(default)]
    pub execution_config: Option<Value>,
}

/// Request body for attaching or detaching tools.
#[derive(Debug, Deserialize)]
pub struct ToolIdsRequest {
    pub tool_ids: Vec<String>,
}

fn parse_execution_type(s: &str) -> Result<ToolExecutionType, ApiError> {
    ToolExecutionType::parse(s).ok_or_else(|| {
        ApiError::BadRequest("execution_type must be 'webhook' or 'static_return'".to_string())
    })
}

fn validate_tool_name(name: &str) -> Result<(), ApiError> {
    if !is_valid_tool_name(name) {
        return Err(ApiError::BadRequest(
            "tool_name must match ^[a-z_][a-z0-9_]*$".to_string(),
        ));
    }
    Ok(())
}

fn validate_parameters(parameters: &[ToolParameter]) -> Result<(), ApiError> {
    let mut seen: Vec<&str> = Vec::new();
    for param in parameters {
        if param.name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "parameter names must not be empty".to_string(),
            ));
        }
        if seen.contains(&param.name.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "duplicate parameter name: {}",
                param.name
            )));
        }
        seen.push(&param.name);
    }
    Ok(())
}

/// Validates an execution config against its execution type. Runs on create
/// and on the merged record during update, so a type switch cannot leave a
/// stale config behind.
fn validate_execution(
    execution_type: ToolExecutionType,
    config: &Value,
) -> Result<(), ApiError> {
    match execution_type {
        ToolExecutionType::Webhook => {
            let url = config.get("url").and_then(Value::as_str).unwrap_or("");
            if url.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "webhook execution_config requires a url".to_string(),
                ));
            }
            if let Some(headers) = config.get("headers") {
                let all_strings = headers
                    .as_object()
                    .is_some_and(|map| map.values().all(Value::is_string));
                if !all_strings {
                    return Err(ApiError::BadRequest(
                        "webhook headers must be an object of strings".to_string(),
                    ));
                }
            }
            if let Some(timeout) = config.get("timeout_secs") {
                if !timeout.as_u64().is_some_and(|t| t >= 1) {
                    return Err(ApiError::BadRequest(
                        "timeout_secs must be a positive integer".to_string(),
                    ));
                }
            }
        }
        ToolExecutionType::StaticReturn => {
            if config.get("value").is_none() {
                return Err(ApiError::BadRequest(
                    "static_return execution_config requires a value".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// The details shape: the full record minus the internal row id.
fn tool_data(tool: &Tool) -> Value {
    json!({
        "tool_id": tool.tool_id,
        "tool_name": tool.tool_name,
        "tool_description": tool.tool_description,
        "parameters": tool.parameters,
        "execution_type": tool.execution_type,
        "execution_config": tool.execution_config,
        "created_by_email": tool.created_by_email,
        "updated_by_email": tool.updated_by_email,
        "created_at": tool.created_at,
        "updated_at": tool.updated_at,
    })
}

fn tool_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => ApiError::NotFound("Tool not found".to_string()),
        other => other.into(),
    }
}

/// Handler for `POST /tool/create`.
pub async fn create_tool_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Json(payload): Json<CreateToolRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_tool_name(&payload.tool_name)?;
    if payload.tool_description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "tool_description is required".to_string(),
        ));
    }
    validate_parameters(&payload.parameters)?;
    let execution_type = parse_execution_type(&payload.execution_type)?;
    validate_execution(execution_type, &payload.execution_config)?;

    let params = CreateToolParams {
        tool_id: Uuid::new_v4().to_string(),
        tool_name: payload.tool_name,
        tool_description: payload.tool_description,
        parameters: payload.parameters,
        execution_type,
        execution_config: payload.execution_config,
        created_by_email: key.user_email,
    };
    let tool = run_blocking(move || {
        let conn = state.pool.get()?;
        Ok(store::create_tool(&conn, &params)?)
    })
    .await?;

    Ok(envelope("Tool created successfully", tool_data(&tool)))
}

/// Handler for `PATCH /tool/update/{tool_id}`.
pub async fn update_tool_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(tool_id): Path<String>,
    Json(payload): Json<UpdateToolRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(name) = &payload.tool_name {
        validate_tool_name(name)?;
    }
    if let Some(description) = &payload.tool_description {
        if description.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "tool_description must not be empty".to_string(),
            ));
        }
    }
    if let Some(parameters) = &payload.parameters {
        validate_parameters(parameters)?;
    }
    let requested_type = payload
        .execution_type
        .as_deref()
        .map(parse_execution_type)
        .transpose()?;

    let tool = run_blocking(move || {
        let conn = state.pool.get()?;
        let current = store::get_tool(&conn, &tool_id, &key.user_email).map_err(tool_not_found)?;

        // Validate execution settings against the merged record.
        if requested_type.is_some() || payload.execution_config.is_some() {
            let execution_type = requested_type.unwrap_or(current.execution_type);
            let config = payload
                .execution_config
                .as_ref()
                .unwrap_or(&current.execution_config);
            validate_execution(execution_type, config)?;
        }

        let params = UpdateToolParams {
            tool_name: payload.tool_name,
            tool_description: payload.tool_description,
            parameters: payload.parameters,
            execution_type: requested_type,
            execution_config: payload.execution_config,
        };
        store::update_tool(&conn, &tool_id, &key.user_email, &params, &key.user_email)
            .map_err(tool_not_found)
    })
    .await?;

    Ok(envelope("Tool updated successfully", tool_data(&tool)))
}

/// Handler for `GET /tool/list`.
pub async fn list_tools_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let tools = run_blocking(move || {
        let conn = state.pool.get()?;
        Ok(store::list_tools(&conn, &key.user_email)?)
    })
    .await?;

    Ok(envelope("Tools fetched successfully", tools))
}

/// Handler for `GET /tool/details/{tool_id}`.
pub async fn get_tool_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(tool_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tool = run_blocking(move || {
        let conn = state.pool.get()?;
        store::get_tool(&conn, &tool_id, &key.user_email).map_err(tool_not_found)
    })
    .await?;

    Ok(envelope("Tool details fetched successfully", tool_data(&tool)))
}

/// Handler for `DELETE /tool/delete/{tool_id}`.
pub async fn delete_tool_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(tool_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let swept = run_blocking(move || {
        let conn = state.pool.get()?;
        store::delete_tool(&conn, &tool_id, &key.user_email).map_err(tool_not_found)
    })
    .await?;

    Ok(envelope(
        "Tool deleted successfully",
        json!({"detached_from_assistants": swept}),
    ))
}

/// Handler for `POST /tool/attach/{assistant_id}`.
///
/// All-or-nothing: if any supplied ID does not resolve to one of the
/// caller's active tools, nothing is attached and the response lists the
/// offending IDs.
pub async fn attach_tools_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(assistant_id): Path<String>,
    Json(payload): Json<ToolIdsRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.tool_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "tool_ids must be a non-empty list".to_string(),
        ));
    }

    let tool_ids = run_blocking(move || {
        let conn = state.pool.get()?;
        store::attach_tools(&conn, &assistant_id, &key.user_email, &payload.tool_ids)
            .map_err(|e| match e {
                StoreError::NotFound(_) => ApiError::NotFound("Assistant not found".to_string()),
                other => other.into(),
            })
    })
    .await?;

    Ok(envelope(
        "Tools attached successfully",
        json!({"tool_ids": tool_ids}),
    ))
}

/// Handler for `POST /tool/detach/{assistant_id}`. Detaching an ID that is
/// not attached is a no-op, not an error.
pub async fn detach_tools_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(key)): Extension<CurrentUser>,
    Path(assistant_id): Path<String>,
    Json(payload): Json<ToolIdsRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.tool_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "tool_ids must be a non-empty list".to_string(),
        ));
    }

    let tool_ids = run_blocking(move || {
        let conn = state.pool.get()?;
        store::detach_tools(&conn, &assistant_id, &key.user_email, &payload.tool_ids)
            .map_err(assistant_not_found)
    })
    .await?;

    Ok(envelope(
        "Tools detached successfully",
        json!({"tool_ids": tool_ids}),
    ))
}
