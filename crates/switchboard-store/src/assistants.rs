//! Assistant configuration records and tool attachments.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use switchboard_types::TtsProvider;

use crate::{now_rfc3339, tools, StoreError};

/// A voice-assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assistant {
    /// Internal database ID.
    pub id: i64,
    /// Unique public ID (UUID).
    pub assistant_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// TTS provider for the assistant's voice.
    pub tts_provider: TtsProvider,
    /// Cartesia voice selection. Set exactly when the provider is `cartesia`.
    pub voice_id: Option<String>,
    /// Sarvam speaker selection. Set exactly when the provider is `sarvam`.
    pub speaker: Option<String>,
    /// System prompt. May contain `{{placeholder}}` tokens rendered per call.
    pub prompt: String,
    /// Optional templated first instruction for the session greeting.
    pub start_instruction: Option<String>,
    /// Optional URL notified with the call record when a call ends.
    pub end_call_url: Option<String>,
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

/// The subset of assistant fields returned by list queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantSummary {
    pub assistant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub tts_provider: TtsProvider,
    pub created_at: String,
}

/// Parameters for creating a new assistant.
#[derive(Debug, Clone)]
pub struct CreateAssistantParams {
    pub assistant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub tts_provider: TtsProvider,
    pub voice_id: Option<String>,
    pub speaker: Option<String>,
    pub prompt: String,
    pub start_instruction: Option<String>,
    pub end_call_url: Option<String>,
    pub created_by_email: String,
}

/// Parameters for updating an existing assistant.
///
/// Only fields that are `Some` are written; `None` fields keep their stored
/// value. Provider/voice coherence is validated by the caller against the
/// merged record before this is applied.
#[derive(Debug, Clone, Default)]
pub struct UpdateAssistantParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tts_provider: Option<TtsProvider>,
    pub voice_id: Option<Option<String>>,
    pub speaker: Option<Option<String>>,
    pub prompt: Option<String>,
    pub start_instruction: Option<String>,
    pub end_call_url: Option<String>,
}

/// Creates a new assistant and returns the stored record.
pub fn create_assistant(
    conn: &Connection,
    params: &CreateAssistantParams,
) -> Result<Assistant, StoreError> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO assistants (
            assistant_id, name, description, tts_provider, voice_id, speaker,
            prompt, start_instruction, end_call_url,
            created_by_email, updated_by_email, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?11, ?11)",
        params![
            params.assistant_id,
            params.name,
            params.description,
            params.tts_provider.as_str(),
            params.voice_id,
            params.speaker,
            params.prompt,
            params.start_instruction,
            params.end_call_url,
            params.created_by_email,
            now,
        ],
    )?;
    get_assistant(conn, &params.assistant_id, &params.created_by_email)
}

/// Retrieves an active assistant by public ID, scoped to its owner.
pub fn get_assistant(
    conn: &Connection,
    assistant_id: &str,
    owner_email: &str,
) -> Result<Assistant, StoreError> {
    conn.query_row(
        &format!("{ASSISTANT_SELECT} WHERE assistant_id = ?1 AND created_by_email = ?2 AND is_active = 1"),
        params![assistant_id, owner_email],
        map_row_to_assistant,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(assistant_id.to_string()))
}

/// Retrieves an active assistant by public ID regardless of owner.
///
/// Used by the call worker, which resolves assistants from dispatch metadata
/// rather than from an authenticated request.
pub fn get_assistant_any_owner(
    conn: &Connection,
    assistant_id: &str,
) -> Result<Assistant, StoreError> {
    conn.query_row(
        &format!("{ASSISTANT_SELECT} WHERE assistant_id = ?1 AND is_active = 1"),
        params![assistant_id],
        map_row_to_assistant,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(assistant_id.to_string()))
}

/// Lists the caller's active assistants, newest first.
pub fn list_assistants(
    conn: &Connection,
    owner_email: &str,
) -> Result<Vec<AssistantSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT assistant_id, name, description, tts_provider, created_at
         FROM assistants
         WHERE created_by_email = ?1 AND is_active = 1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([owner_email], |row| {
        let provider_str: String = row.get(3)?;
        let tts_provider = parse_provider(3, &provider_str)?;
        Ok(AssistantSummary {
            assistant_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            tts_provider,
            created_at: row.get(4)?,
        })
    })?;

    let mut assistants = Vec::new();
    for row in rows {
        assistants.push(row?);
    }
    Ok(assistants)
}

/// Updates an assistant using a single dynamic UPDATE statement.
///
/// Only fields that are `Some` in `updates` are modified. `updated_at` and
/// `updated_by_email` are always stamped. Returns the refreshed record.
pub fn update_assistant(
    conn: &Connection,
    assistant_id: &str,
    owner_email: &str,
    updates: &UpdateAssistantParams,
    updated_by_email: &str,
) -> Result<Assistant, StoreError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(name) = &updates.name {
        set_parts.push(format!("name = ?{}", idx));
        values.push(Box::new(name.clone()));
        idx += 1;
    }
    if let Some(description) = &updates.description {
        set_parts.push(format!("description = ?{}", idx));
        values.push(Box::new(description.clone()));
        idx += 1;
    }
    if let Some(provider) = &updates.tts_provider {
        set_parts.push(format!("tts_provider = ?{}", idx));
        values.push(Box::new(provider.as_str().to_string()));
        idx += 1;
    }
    if let Some(voice_id) = &updates.voice_id {
        set_parts.push(format!("voice_id = ?{}", idx));
        values.push(Box::new(voice_id.clone()));
        idx += 1;
    }
    if let Some(speaker) = &updates.speaker {
        set_parts.push(format!("speaker = ?{}", idx));
        values.push(Box::new(speaker.clone()));
        idx += 1;
    }
    if let Some(prompt) = &updates.prompt {
        set_parts.push(format!("prompt = ?{}", idx));
        values.push(Box::new(prompt.clone()));
        idx += 1;
    }
    if let Some(start_instruction) = &updates.start_instruction {
        set_parts.push(format!("start_instruction = ?{}", idx));
        values.push(Box::new(start_instruction.clone()));
        idx += 1;
    }
    if let Some(end_call_url) = &updates.end_call_url {
        set_parts.push(format!("end_call_url = ?{}", idx));
        values.push(Box::new(end_call_url.clone()));
        idx += 1;
    }

    set_parts.push(format!("updated_at = ?{}", idx));
    values.push(Box::new(now_rfc3339()));
    idx += 1;
    set_parts.push(format!("updated_by_email = ?{}", idx));
    values.push(Box::new(updated_by_email.to_string()));
    idx += 1;

    let sql = format!(
        "UPDATE assistants SET {} WHERE assistant_id = ?{} AND created_by_email = ?{} AND is_active = 1",
        set_parts.join(", "),
        idx,
        idx + 1
    );
    values.push(Box::new(assistant_id.to_string()));
    values.push(Box::new(owner_email.to_string()));

    let sql_params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, sql_params.as_slice())?;
    if count == 0 {
        return Err(StoreError::NotFound(assistant_id.to_string()));
    }
    get_assistant(conn, assistant_id, owner_email)
}

/// Lists the tool IDs attached to an assistant, in attachment order.
pub fn list_attached_tool_ids(
    conn: &Connection,
    assistant_id: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT tool_id FROM assistant_tools WHERE assistant_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([assistant_id], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Attaches tools to an assistant as a set union.
///
/// Every ID in `tool_ids` must resolve to an active tool owned by the caller;
/// otherwise the whole batch is rejected with `StoreError::ToolsMissing` and
/// nothing is written. Already-attached IDs are ignored. Returns the updated
/// attachment list.
pub fn attach_tools(
    conn: &Connection,
    assistant_id: &str,
    owner_email: &str,
    tool_ids: &[String],
) -> Result<Vec<String>, StoreError> {
    let _ = get_assistant(conn, assistant_id, owner_email)?;

    let missing = tools::missing_tool_ids(conn, owner_email, tool_ids)?;
    if !missing.is_empty() {
        return Err(StoreError::ToolsMissing { ids: missing });
    }

    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();
    for tool_id in tool_ids {
        tx.execute(
            "INSERT OR IGNORE INTO assistant_tools (assistant_id, tool_id, attached_at)
             VALUES (?1, ?2, ?3)",
            params![assistant_id, tool_id, now],
        )?;
    }
    tx.commit()?;

    list_attached_tool_ids(conn, assistant_id)
}

/// Detaches tools from an assistant as a set difference.
///
/// IDs that are not attached are ignored. Returns the updated attachment
/// list.
pub fn detach_tools(
    conn: &Connection,
    assistant_id: &str,
    owner_email: &str,
    tool_ids: &[String],
) -> Result<Vec<String>, StoreError> {
    let _ = get_assistant(conn, assistant_id, owner_email)?;

    let tx = conn.unchecked_transaction()?;
    for tool_id in tool_ids {
        tx.execute(
            "DELETE FROM assistant_tools WHERE assistant_id = ?1 AND tool_id = ?2",
            params![assistant_id, tool_id],
        )?;
    }
    tx.commit()?;

    list_attached_tool_ids(conn, assistant_id)
}

const ASSISTANT_SELECT: &str = "SELECT
    id, assistant_id, name, description, tts_provider, voice_id, speaker,
    prompt, start_instruction, end_call_url,
    created_by_email, updated_by_email, created_at, updated_at, is_active
FROM assistants";

fn parse_provider(col: usize, s: &str) -> rusqlite::Result<TtsProvider> {
    TtsProvider::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Text,
            format!("unknown tts provider: {s}").into(),
        )
    })
}

fn map_row_to_assistant(row: &Row) -> rusqlite::Result<Assistant> {
    let provider_str: String = row.get(4)?;
    let tts_provider = parse_provider(4, &provider_str)?;

    Ok(Assistant {
        id: row.get(0)?,
        assistant_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        tts_provider,
        voice_id: row.get(5)?,
        speaker: row.get(6)?,
        prompt: row.get(7)?,
        start_instruction: row.get(8)?,
        end_call_url: row.get(9)?,
        created_by_email: row.get(10)?,
        updated_by_email: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        is_active: row.get(14)?,
    })
}
