//! API key records and credential lookup.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{now_rfc3339, StoreError};

/// An issued API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKey {
    /// Internal database ID.
    pub id: i64,
    /// The bearer credential itself.
    pub api_key: String,
    /// Display name of the key holder.
    pub user_name: String,
    /// Optional organization name.
    pub org_name: Option<String>,
    /// Email of the key holder. Unique; all owned records are scoped to it.
    pub user_email: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Inactive keys fail authentication but are never deleted.
    pub is_active: bool,
}

/// Parameters for issuing a new API key.
#[derive(Debug, Clone)]
pub struct CreateApiKeyParams {
    pub api_key: String,
    pub user_name: String,
    pub org_name: Option<String>,
    pub user_email: String,
}

/// Issues a new API key.
///
/// Returns `StoreError::Conflict` if a key already exists for the email.
pub fn create_api_key(conn: &Connection, params: &CreateApiKeyParams) -> Result<ApiKey, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM api_keys WHERE user_email = ?1)",
        [&params.user_email],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::Conflict(format!(
            "an API key already exists for {}",
            params.user_email
        )));
    }

    conn.query_row(
        "INSERT INTO api_keys (api_key, user_name, org_name, user_email, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, api_key, user_name, org_name, user_email, created_at, is_active",
        params![
            params.api_key,
            params.user_name,
            params.org_name,
            params.user_email,
            now_rfc3339(),
        ],
        map_row_to_api_key,
    )
    .map_err(StoreError::Database)
}

/// Looks up an active key by its credential string.
///
/// Returns `Ok(None)` when the key is unknown or deactivated.
pub fn find_active_key(conn: &Connection, api_key: &str) -> Result<Option<ApiKey>, StoreError> {
    conn.query_row(
        "SELECT id, api_key, user_name, org_name, user_email, created_at, is_active
         FROM api_keys WHERE api_key = ?1 AND is_active = 1",
        [api_key],
        map_row_to_api_key,
    )
    .optional()
    .map_err(StoreError::Database)
}

fn map_row_to_api_key(row: &Row) -> rusqlite::Result<ApiKey> {
    Ok(ApiKey {
        id: row.get(0)?,
        api_key: row.get(1)?,
        user_name: row.get(2)?,
        org_name: row.get(3)?,
        user_email: row.get(4)?,
        created_at: row.get(5)?,
        is_active: row.get(6)?,
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

    fn sample_params(suffix: &str) -> CreateApiKeyParams {
        CreateApiKeyParams {
            api_key: format!("sb_testkey_{suffix}"),
            user_name: "Ada".to_string(),
            org_name: Some("Analytical Engines".to_string()),
            user_email: format!("ada+{suffix}@example.com"),
        }
    }

    #[test]
    fn create_and_find_key() {
        let conn = setup_db();
        let created = create_api_key(&conn, &sample_params("a")).expect("create failed");
        assert!(created.is_active);
        assert_eq!(created.user_name, "Ada");

        let found = find_active_key(&conn, "sb_testkey_a")
            .expect("lookup failed")
            .expect("key should exist");
        assert_eq!(found.id, created.id);
        assert_eq!(found.user_email, "ada+a@example.com");
    }

    #[test]
    fn duplicate_email_conflicts() {
        let conn = setup_db();
        create_api_key(&conn, &sample_params("b")).expect("create failed");

        let mut dup = sample_params("c");
        dup.user_email = "ada+b@example.com".to_string();
        let err = create_api_key(&conn, &dup).unwrap_err();
        match err {
            StoreError::Conflict(_) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn inactive_key_not_found() {
        let conn = setup_db();
        create_api_key(&conn, &sample_params("d")).expect("create failed");
        conn.execute(
            "UPDATE api_keys SET is_active = 0 WHERE api_key = 'sb_testkey_d'",
            [],
        )
        .expect("deactivate failed");

        let found = find_active_key(&conn, "sb_testkey_d").expect("lookup failed");
        assert!(found.is_none());
    }

    #[test]
    fn unknown_key_not_found() {
        let conn = setup_db();
        let found = find_active_key(&conn, "sb_nope").expect("lookup failed");
        assert!(found.is_none());
    }
}
