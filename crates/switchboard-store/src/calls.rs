//! Call records and transcripts.
//!
//! One call record per room. The record is normally created when the worker
//! session starts; the transcript append path also creates it on demand so
//! a turn arriving before session bookkeeping never gets lost. Appends are a
//! single transaction (record upsert + transcript insert), so there is no
//! read-modify-write window between concurrent turn handlers.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use switchboard_types::{Speaker, TranscriptEntry};

use crate::StoreError;

/// A record of one call session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    /// Internal database ID.
    pub id: i64,
    /// Platform room name (`{assistant_id}_{suffix}`), unique per call.
    pub room_name: String,
    /// Public ID of the assistant that served the call.
    pub assistant_id: String,
    /// Assistant display name at call time.
    pub assistant_name: String,
    /// Dialed number for outbound calls.
    pub to_number: Option<String>,
    /// Platform egress ID when a recording was started.
    pub recording_id: Option<String>,
    /// Session start timestamp (RFC 3339).
    pub started_at: String,
    /// Session end timestamp (RFC 3339), set at finalization.
    pub ended_at: Option<String>,
    /// Call length in fractional minutes, set at finalization.
    pub duration_minutes: Option<f64>,
}

/// Identity fields for creating a call record.
#[derive(Debug, Clone)]
pub struct StartCallParams {
    pub room_name: String,
    pub assistant_id: String,
    pub assistant_name: String,
    pub to_number: Option<String>,
    /// Session start timestamp (RFC 3339).
    pub started_at: String,
}

/// One transcript line plus the identity fields needed to create the call
/// record on demand.
#[derive(Debug, Clone)]
pub struct AppendTranscriptParams {
    pub room_name: String,
    pub assistant_id: String,
    pub assistant_name: String,
    pub to_number: Option<String>,
    pub speaker: Speaker,
    pub text: String,
    /// Turn timestamp (RFC 3339); also used as `started_at` if the append
    /// has to create the record.
    pub timestamp: String,
}

/// Creates the call record for a room if it does not exist yet.
pub fn start_call_record(conn: &Connection, params: &StartCallParams) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO call_records (
            room_name, assistant_id, assistant_name, to_number, started_at
         ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            params.room_name,
            params.assistant_id,
            params.assistant_name,
            params.to_number,
            params.started_at,
        ],
    )?;
    Ok(())
}

/// Appends one transcript line, creating the call record on demand.
pub fn append_transcript(
    conn: &Connection,
    params: &AppendTranscriptParams,
) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO call_records (
            room_name, assistant_id, assistant_name, to_number, started_at
         ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            params.room_name,
            params.assistant_id,
            params.assistant_name,
            params.to_number,
            params.timestamp,
        ],
    )?;
    tx.execute(
        "INSERT INTO call_transcripts (room_name, speaker, text, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            params.room_name,
            params.speaker.as_str(),
            params.text,
            params.timestamp,
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Stores the platform egress ID on an existing call record.
pub fn set_recording_id(
    conn: &Connection,
    room_name: &str,
    recording_id: &str,
) -> Result<(), StoreError> {
    let count = conn.execute(
        "UPDATE call_records SET recording_id = ?2 WHERE room_name = ?1",
        params![room_name, recording_id],
    )?;
    if count == 0 {
        return Err(StoreError::NotFound(room_name.to_string()));
    }
    Ok(())
}

/// Finalizes a call: stamps `ended_at` and computes the duration in
/// fractional minutes inside the UPDATE itself. Returns the final record.
pub fn finalize_call(
    conn: &Connection,
    room_name: &str,
    ended_at: &str,
) -> Result<CallRecord, StoreError> {
    let count = conn.execute(
        "UPDATE call_records
         SET ended_at = ?2,
             duration_minutes = (julianday(?2) - julianday(started_at)) * 1440.0
         WHERE room_name = ?1",
        params![room_name, ended_at],
    )?;
    if count == 0 {
        return Err(StoreError::NotFound(room_name.to_string()));
    }
    get_call_record(conn, room_name)?.ok_or_else(|| StoreError::NotFound(room_name.to_string()))
}

/// Retrieves the call record for a room, if one exists.
pub fn get_call_record(
    conn: &Connection,
    room_name: &str,
) -> Result<Option<CallRecord>, StoreError> {
    conn.query_row(
        "SELECT id, room_name, assistant_id, assistant_name, to_number,
                recording_id, started_at, ended_at, duration_minutes
         FROM call_records WHERE room_name = ?1",
        [room_name],
        map_row_to_call_record,
    )
    .optional()
    .map_err(StoreError::Database)
}

/// Lists the transcript for a room in insertion order.
pub fn list_transcripts(
    conn: &Connection,
    room_name: &str,
) -> Result<Vec<TranscriptEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT speaker, text, timestamp
         FROM call_transcripts WHERE room_name = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([room_name], |row| {
        let speaker_str: String = row.get(0)?;
        let speaker = Speaker::parse(&speaker_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown speaker: {speaker_str}").into(),
            )
        })?;
        Ok(TranscriptEntry {
            speaker,
            text: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn map_row_to_call_record(row: &Row) -> rusqlite::Result<CallRecord> {
    Ok(CallRecord {
        id: row.get(0)?,
        room_name: row.get(1)?,
        assistant_id: row.get(2)?,
        assistant_name: row.get(3)?,
        to_number: row.get(4)?,
        recording_id: row.get(5)?,
        started_at: row.get(6)?,
        ended_at: row.get(7)?,
        duration_minutes: row.get(8)?,
    })
}
