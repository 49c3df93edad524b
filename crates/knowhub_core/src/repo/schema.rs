//! Connection readiness checks shared by repositories.

use super::{RepoError, RepoResult};
use crate::db::migrations::{latest_version, schema_version};
use rusqlite::Connection;

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "folders",
        &["id", "name", "parent_folder_id", "created_at", "updated_at"],
    ),
    (
        "notes",
        &["id", "title", "content", "folder_id", "created_at", "updated_at"],
    ),
    (
        "note_tables",
        &["id", "note_id", "name", "rows_json", "position", "created_at", "updated_at"],
    ),
    (
        "table_columns",
        &["id", "table_id", "name", "data_type", "position", "created_at", "updated_at"],
    ),
];

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        let present = table_columns(conn, table)?;
        if present.is_empty() {
            return Err(RepoError::MissingRequiredTable(table));
        }
        if let Some(column) = columns
            .iter()
            .copied()
            .find(|column| !present.iter().any(|p| p == column))
        {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    let foreign_keys: i64 = conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))?;
    if foreign_keys != 1 {
        return Err(RepoError::ForeignKeysDisabled);
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
