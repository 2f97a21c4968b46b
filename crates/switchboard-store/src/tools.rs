//! Tool definition records.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use switchboard_types::{ToolExecutionType, ToolParameter};

use crate::{now_rfc3339, StoreError};

/// A stored tool (function-calling) definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Internal database ID.
    pub id: i64,
    /// Unique public ID (UUID).
    pub tool_id: String,
    /// Function name exposed to the model (`^[a-z_][a-z0-9_]*$`).
    pub tool_name: String,
    /// Description surfaced to the model.
    pub tool_description: String,
    /// Ordered parameter definitions.
    pub parameters: Vec<ToolParameter>,
    /// How invocations are executed.
    pub execution_type: ToolExecutionType,
    /// Execution settings: `{url, headers?, timeout_secs?}` for webhooks,
    /// `{value}` for static returns.
    pub execution_config: serde_json::Value,
    /// Email of the creating API key.
    pub created_by_email: String,
    /// Email of the last updater.
    pub updated_by_email: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
    /// Soft-delete flag.
    pub is_active: bool,
}

/// The subset of tool fields returned by list queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSummary {
    pub tool_id: String,
    pub tool_name: String,
    pub tool_description: String,
    pub execution_type: ToolExecutionType,
    pub created_at: String,
}

/// Parameters for creating a new tool.
#[derive(Debug, Clone)]
pub struct CreateToolParams {
    pub tool_id: String,
    pub tool_name: String,
    pub tool_description: String,
    pub parameters: Vec<ToolParameter>,
    pub execution_type: ToolExecutionType,
    pub execution_config: serde_json::Value,
    pub created_by_email: String,
}

/// Parameters for updating an existing tool.
#[derive(Debug, Clone, Default)]
pub struct UpdateToolParams {
    pub tool_name: Option<String>,
    pub tool_description: Option<String>,
    pub parameters: Option<Vec<ToolParameter>>,
    pub execution_type: Option<ToolExecutionType>,
    pub execution_config: Option<serde_json::Value>,
}

/// Creates a new tool and returns the stored record.
pub fn create_tool(conn: &Connection, params: &CreateToolParams) -> Result<Tool, StoreError> {
    let parameters_json = serde_json::to_string(&params.parameters)?;
    let config_json = serde_json::to_string(&params.execution_config)?;
    let now = now_rfc3339();

    conn.execute(
        "INSERT INTO tools (
            tool_id, tool_name, tool_description, parameters,
            execution_type, execution_config,
            created_by_email, updated_by_email, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?8)",
        params![
            params.tool_id,
            params.tool_name,
            params.tool_description,
            parameters_json,
            params.execution_type.as_str(),
            config_json,
            params.created_by_email,
            now,
        ],
    )?;
    get_tool(conn, &params.tool_id, &params.created_by_email)
}

/// Retrieves an active tool by public ID, scoped to its owner.
pub fn get_tool(conn: &Connection, tool_id: &str, owner_email: &str) -> Result<Tool, StoreError> {
    conn.query_row(
        &format!("{TOOL_SELECT} WHERE tool_id = ?1 AND created_by_email = ?2 AND is_active = 1"),
        params![tool_id, owner_email],
        map_row_to_tool,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(tool_id.to_string()))
}

/// Lists the caller's active tools, newest first.
pub fn list_tools(conn: &Connection, owner_email: &str) -> Result<Vec<ToolSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT tool_id, tool_name, tool_description, execution_type, created_at
         FROM tools
         WHERE created_by_email = ?1 AND is_active = 1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([owner_email], |row| {
        let exec_str: String = row.get(3)?;
        let execution_type = parse_execution_type(3, &exec_str)?;
        Ok(ToolSummary {
            tool_id: row.get(0)?,
            tool_name: row.get(1)?,
            tool_description: row.get(2)?,
            execution_type,
            created_at: row.get(4)?,
        })
    })?;

    let mut tools = Vec::new();
    for row in rows {
        tools.push(row?);
    }
    Ok(tools)
}

/// Updates a tool using a single dynamic UPDATE statement.
///
/// Only fields that are `Some` in `updates` are modified. Returns the
/// refreshed record.
pub fn update_tool(
    conn: &Connection,
    tool_id: &str,
    owner_email: &str,
    updates: &UpdateToolParams,
    updated_by_email: &str,
) -> Result<Tool, StoreError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(name) = &updates.tool_name {
        set_parts.push(format!("tool_name = ?{}", idx));
        values.push(Box::new(name.clone()));
        idx += 1;
    }
    if let Some(description) = &updates.tool_description {
        set_parts.push(format!("tool_description = ?{}", idx));
        values.push(Box::new(description.clone()));
        idx += 1;
    }
    if let Some(parameters) = &updates.parameters {
        let json = serde_json::to_string(parameters)?;
        set_parts.push(format!("parameters = ?{}", idx));
        values.push(Box::new(json));
        idx += 1;
    }
    if let Some(execution_type) = &updates.execution_type {
        set_parts.push(format!("execution_type = ?{}", idx));
        values.push(Box::new(execution_type.as_str().to_string()));
        idx += 1;
    }
    if let Some(config) = &updates.execution_config {
        let json = serde_json::to_string(config)?;
        set_parts.push(format!("execution_config = ?{}", idx));
        values.push(Box::new(json));
        idx += 1;
    }

    set_parts.push(format!("updated_at = ?{}", idx));
    values.push(Box::new(now_rfc3339()));
    idx += 1;
    set_parts.push(format!("updated_by_email = ?{}", idx));
    values.push(Box::new(updated_by_email.to_string()));
    idx += 1;

    let sql = format!(
        "UPDATE tools SET {} WHERE tool_id = ?{} AND created_by_email = ?{} AND is_active = 1",
        set_parts.join(", "),
        idx,
        idx + 1
    );
    values.push(Box::new(tool_id.to_string()));
    values.push(Box::new(owner_email.to_string()));

    let sql_params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, sql_params.as_slice())?;
    if count == 0 {
        return Err(StoreError::NotFound(tool_id.to_string()));
    }
    get_tool(conn, tool_id, owner_email)
}

/// Soft-deletes a tool and sweeps it out of the owner's assistants.
///
/// Returns the number of assistant attachments removed. Both writes happen
/// in one transaction.
pub fn delete_tool(
    conn: &Connection,
    tool_id: &str,
    owner_email: &str,
) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;

    let count = tx.execute(
        "UPDATE tools SET is_active = 0, updated_at = ?3, updated_by_email = ?2
         WHERE tool_id = ?1 AND created_by_email = ?2 AND is_active = 1",
        params![tool_id, owner_email, now_rfc3339()],
    )?;
    if count == 0 {
        return Err(StoreError::NotFound(tool_id.to_string()));
    }

    let swept = tx.execute(
        "DELETE FROM assistant_tools
         WHERE tool_id = ?1
           AND assistant_id IN (SELECT assistant_id FROM assistants WHERE created_by_email = ?2)",
        params![tool_id, owner_email],
    )?;

    tx.commit()?;
    tracing::debug!(tool_id, swept, "tool deleted and detached from assistants");
    Ok(swept)
}

/// Returns the subset of `tool_ids` that do not resolve to an active tool
/// owned by `owner_email`, preserving input order.
pub fn missing_tool_ids(
    conn: &Connection,
    owner_email: &str,
    tool_ids: &[String],
) -> Result<Vec<String>, StoreError> {
    let mut missing = Vec::new();
    for tool_id in tool_ids {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM tools
                WHERE tool_id = ?1 AND created_by_email = ?2 AND is_active = 1
             )",
            params![tool_id, owner_email],
            |row| row.get(0),
        )?;
        if !exists && !missing.contains(tool_id) {
            missing.push(tool_id.clone());
        }
    }
    Ok(missing)
}

/// Loads the active tools attached to an assistant, in attachment order.
///
/// Tools that were soft-deleted after attachment are skipped.
pub fn load_tools_for_assistant(
    conn: &Connection,
    assistant_id: &str,
) -> Result<Vec<Tool>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "{TOOL_SELECT}
         JOIN assistant_tools at ON at.tool_id = tools.tool_id
         WHERE at.assistant_id = ?1 AND tools.is_active = 1
         ORDER BY at.id ASC"
    ))?;

    let rows = stmt.query_map([assistant_id], map_row_to_tool)?;
    let mut tools = Vec::new();
    for row in rows {
        tools.push(row?);
    }
    Ok(tools)
}

const TOOL_SELECT: &str = "SELECT
    tools.id, tools.tool_id, tools.tool_name, tools.tool_description,
    tools.parameters, tools.execution_type, tools.execution_config,
    tools.created_by_email, tools.updated_by_email,
    tools.created_at, tools.updated_at, tools.is_active
FROM tools";

fn parse_execution_type(col: usize, s: &str) -> rusqlite::Result<ToolExecutionType> {
    ToolExecutionType::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Text,
            format!("unknown execution type: {s}").into(),
        )
    })
}

fn map_row_to_tool(row: &Row) -> rusqlite::Result<Tool> {
    let parameters_str: String = row.get(4)?;
    let parameters: Vec<ToolParameter> = serde_json::from_str(&parameters_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let exec_str: String = row.get(5)?;
    let execution_type = parse_execution_type(5, &exec_str)?;

    let config_str: String = row.get(6)?;
    let execution_config: serde_json::Value = serde_json::from_str(&config_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Tool {
        id: row.get(0)?,
        tool_id: row.get(1)?,
        tool_name: row.get(2)?,
        tool_description: row.get(3)?,
        parameters,
        execution_type,
        execution_config,
        created_by_email: row.get(7)?,
        updated_by_email: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        is_active: row.get(11)?,
    })
}
