//! Outbound SIP trunk records.
//!
//! The trunk itself lives on the external platform; this table keeps the
//! platform-assigned ID together with a display name and its owner so the
//! call endpoint can hand callers their own trunks.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{now_rfc3339, StoreError};

/// A registered outbound SIP trunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundTrunk {
    /// Internal database ID.
    pub id: i64,
    /// Platform-assigned trunk ID.
    pub trunk_id: String,
    /// Display name.
    pub trunk_name: String,
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

/// The subset of trunk fields returned by list queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrunkSummary {
    pub trunk_id: String,
    pub trunk_name: String,
    pub created_by_email: String,
}

/// Parameters for registering a trunk the platform has already created.
#[derive(Debug, Clone)]
pub struct CreateTrunkParams {
    pub trunk_id: String,
    pub trunk_name: String,
    pub created_by_email: String,
}

/// Registers a platform-created trunk.
pub fn create_trunk(
    conn: &Connection,
    params: &CreateTrunkParams,
) -> Result<OutboundTrunk, StoreError> {
    let now = now_rfc3339();
    conn.query_row(
        "INSERT INTO outbound_trunks (
            trunk_id, trunk_name, created_by_email, updated_by_email, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?3, ?4, ?4)
         RETURNING id, trunk_id, trunk_name, created_by_email, updated_by_email,
                   created_at, updated_at, is_active",
        params![
            params.trunk_id,
            params.trunk_name,
            params.created_by_email,
            now,
        ],
        map_row_to_trunk,
    )
    .map_err(StoreError::Database)
}

/// Lists the caller's active trunks, newest first.
pub fn list_trunks(conn: &Connection, owner_email: &str) -> Result<Vec<TrunkSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT trunk_id, trunk_name, created_by_email
         FROM outbound_trunks
         WHERE created_by_email = ?1 AND is_active = 1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([owner_email], |row| {
        Ok(TrunkSummary {
            trunk_id: row.get(0)?,
            trunk_name: row.get(1)?,
            created_by_email: row.get(2)?,
        })
    })?;

    let mut trunks = Vec::new();
    for row in rows {
        trunks.push(row?);
    }
    Ok(trunks)
}

fn map_row_to_trunk(row: &Row) -> rusqlite::Result<OutboundTrunk> {
    Ok(OutboundTrunk {
        id: row.get(0)?,
        trunk_id: row.get(1)?,
        trunk_name: row.get(2)?,
        created_by_email: row.get(3)?,
        updated_by_email: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        is_active: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_db::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    #[test]
    fn create_and_list() {
        let conn = setup_db();
        let created = create_trunk(
            &conn,
            &CreateTrunkParams {
                trunk_id: "ST_abc123".to_string(),
                trunk_name: "Main line".to_string(),
                created_by_email: "ops@example.com".to_string(),
            },
        )
        .expect("create failed");
        assert!(created.is_active);
        assert_eq!(created.updated_by_email, "ops@example.com");

        let listed = list_trunks(&conn, "ops@example.com").expect("list failed");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].trunk_id, "ST_abc123");
        assert_eq!(listed[0].trunk_name, "Main line");
    }

    #[test]
    fn list_is_owner_scoped() {
        let conn = setup_db();
        create_trunk(
            &conn,
            &CreateTrunkParams {
                trunk_id: "ST_theirs".to_string(),
                trunk_name: "Their line".to_string(),
                created_by_email: "them@example.com".to_string(),
            },
        )
        .expect("create failed");

        let listed = list_trunks(&conn, "us@example.com").expect("list failed");
        assert!(listed.is_empty());
    }

    #[test]
    fn duplicate_trunk_id_rejected() {
        let conn = setup_db();
        let params = CreateTrunkParams {
            trunk_id: "ST_dup".to_string(),
            trunk_name: "Line".to_string(),
            created_by_email: "ops@example.com".to_string(),
        };
        create_trunk(&conn, &params).expect("create failed");
        assert!(create_trunk(&conn, &params).is_err());
    }
}
