//! Persisted records for the Switchboard platform.
//!
//! Implements CRUD over the SQLite schema owned by `switchboard-db`: API
//! keys, assistant configurations, tool definitions, outbound SIP trunks,
//! and per-call records with their transcripts.
//!
//! Every mutable collection is scoped to the email of the API key that
//! created it; no query in this crate crosses an owner boundary. Deletion is
//! soft (`is_active = 0`) so platform-assigned identifiers stay resolvable.

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("tools not found: {}", ids.join(", "))]
    ToolsMissing { ids: Vec<String> },
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// All row timestamps in the schema use this format; it sorts
/// lexicographically and is accepted by SQLite's date functions.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod api_keys;
mod assistants;
mod calls;
mod tools;
mod trunks;

pub use api_keys::{create_api_key, find_active_key, ApiKey, CreateApiKeyParams};
pub use assistants::{
    attach_tools, create_assistant, detach_tools, get_assistant, get_assistant_any_owner,
    list_assistants, list_attached_tool_ids, update_assistant, Assistant, AssistantSummary,
    CreateAssistantParams, UpdateAssistantParams,
};
pub use calls::{
    append_transcript, finalize_call, get_call_record, list_transcripts, set_recording_id,
    start_call_record, AppendTranscriptParams, CallRecord, StartCallParams,
};
pub use tools::{
    create_tool, delete_tool, get_tool, list_tools, load_tools_for_assistant, missing_tool_ids,
    update_tool, CreateToolParams, Tool, ToolSummary, UpdateToolParams,
};
pub use trunks::{create_trunk, list_trunks, CreateTrunkParams, OutboundTrunk, TrunkSummary};
