//! SQL helpers for note tables and their columns.
//!
//! All helpers run on whatever transaction the caller opened.

use super::{RepoError, RepoResult};
use crate::model::note::NoteId;
use crate::model::table::{ColumnId, ColumnType, NoteTable, TableColumn, TableId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const TABLE_SELECT_SQL: &str = "SELECT
    id,
    note_id,
    name,
    rows_json,
    created_at,
    updated_at
FROM note_tables";

const COLUMN_SELECT_SQL: &str = "SELECT
    id,
    table_id,
    name,
    data_type,
    created_at,
    updated_at
FROM table_columns";

pub(super) fn load_table(conn: &Connection, table_id: TableId) -> RepoResult<Option<NoteTable>> {
    let mut stmt = conn.prepare(&format!("{TABLE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([table_id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut table = parse_table_row(row)?;
    table.columns = load_columns(conn, table_id)?;
    Ok(Some(table))
}

pub(super) fn load_tables_for_note(conn: &Connection, note_id: NoteId) -> RepoResult<Vec<NoteTable>> {
    let mut stmt = conn.prepare(&format!(
        "{TABLE_SELECT_SQL} WHERE note_id = ?1 ORDER BY position ASC, id ASC;"
    ))?;
    let mut rows = stmt.query([note_id])?;
    let mut tables = Vec::new();
    while let Some(row) = rows.next()? {
        tables.push(parse_table_row(row)?);
    }
    for table in &mut tables {
        if let Some(id) = table.id {
            table.columns = load_columns(conn, id)?;
        }
    }
    Ok(tables)
}

/// Loads every table with columns, ordered by id.
pub(super) fn load_all_tables(conn: &Connection) -> RepoResult<Vec<NoteTable>> {
    let mut columns_by_table: HashMap<TableId, Vec<TableColumn>> = HashMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "{COLUMN_SELECT_SQL} ORDER BY table_id ASC, position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let column = parse_column_row(row)?;
            let table_id: TableId = row.get("table_id")?;
            columns_by_table.entry(table_id).or_default().push(column);
        }
    }

    let mut stmt = conn.prepare(&format!("{TABLE_SELECT_SQL} ORDER BY id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut tables = Vec::new();
    while let Some(row) = rows.next()? {
        let mut table = parse_table_row(row)?;
        if let Some(columns) = table.id.and_then(|id| columns_by_table.remove(&id)) {
            table.columns = columns;
        }
        tables.push(table);
    }
    Ok(tables)
}

pub(super) fn table_ids_for_note(conn: &Connection, note_id: NoteId) -> RepoResult<Vec<TableId>> {
    let mut stmt = conn.prepare("SELECT id FROM note_tables WHERE note_id = ?1;")?;
    let mut rows = stmt.query([note_id])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

/// Note that currently owns `table_id`, if the table exists.
pub(super) fn table_owner(conn: &Connection, table_id: TableId) -> RepoResult<Option<NoteId>> {
    Ok(conn
        .query_row(
            "SELECT note_id FROM note_tables WHERE id = ?1;",
            [table_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Inserts `table` under `note_id`, keeping its id when it already has one.
pub(super) fn insert_table(
    conn: &Connection,
    note_id: NoteId,
    position: usize,
    table: &NoteTable,
) -> RepoResult<TableId> {
    conn.execute(
        "INSERT INTO note_tables (id, note_id, name, rows_json, position, created_at, updated_at)
         VALUES (
            ?1, ?2, ?3, ?4, ?5,
            COALESCE(NULLIF(?6, 0), (strftime('%s', 'now') * 1000)),
            (strftime('%s', 'now') * 1000)
         );",
        params![
            table.id,
            note_id,
            table.name.as_str(),
            table.rows_json.as_str(),
            position as i64,
            table.created_at,
        ],
    )?;
    let table_id = conn.last_insert_rowid();
    insert_columns(conn, table_id, &table.columns)?;
    Ok(table_id)
}

/// Insert-if-absent, replace-if-present. Columns are replaced wholesale.
///
/// A table id stored under another note is an `OwnershipConflict`.
pub(super) fn upsert_table(
    conn: &Connection,
    note_id: NoteId,
    position: usize,
    table: &NoteTable,
) -> RepoResult<TableId> {
    let Some(table_id) = table.id else {
        return insert_table(conn, note_id, position, table);
    };
    match table_owner(conn, table_id)? {
        None => return insert_table(conn, note_id, position, table),
        Some(owner) if owner != note_id => {
            return Err(RepoError::OwnershipConflict(format!(
                "table {table_id} belongs to note {owner}"
            )));
        }
        Some(_) => {}
    }

    conn.execute(
        "UPDATE note_tables
         SET note_id = ?2,
             name = ?3,
             rows_json = ?4,
             position = ?5,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            table_id,
            note_id,
            table.name.as_str(),
            table.rows_json.as_str(),
            position as i64,
        ],
    )?;
    conn.execute("DELETE FROM table_columns WHERE table_id = ?1;", [table_id])?;
    insert_columns(conn, table_id, &table.columns)?;
    Ok(table_id)
}

pub(super) fn update_rows(conn: &Connection, table_id: TableId, rows_json: &str) -> RepoResult<bool> {
    let changed = conn.execute(
        "UPDATE note_tables
         SET rows_json = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![table_id, rows_json],
    )?;
    Ok(changed > 0)
}

/// Deletes tables by id; columns go with them through the cascade.
pub(super) fn delete_tables(conn: &Connection, table_ids: &[TableId]) -> RepoResult<()> {
    let mut stmt = conn.prepare("DELETE FROM note_tables WHERE id = ?1;")?;
    for table_id in table_ids {
        stmt.execute([table_id])?;
    }
    Ok(())
}

/// Inserts columns in order. Callers remove the table's previous columns
/// first, so any stored row with an incoming column id is someone else's.
fn insert_columns(conn: &Connection, table_id: TableId, columns: &[TableColumn]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO table_columns (id, table_id, name, data_type, position, created_at, updated_at)
         VALUES (
            ?1, ?2, ?3, ?4, ?5,
            COALESCE(NULLIF(?6, 0), (strftime('%s', 'now') * 1000)),
            (strftime('%s', 'now') * 1000)
         );",
    )?;
    for (position, column) in columns.iter().enumerate() {
        if let Some(column_id) = column.id {
            if let Some(owner) = column_owner(conn, column_id)? {
                return Err(RepoError::OwnershipConflict(format!(
                    "column {column_id} belongs to table {owner}"
                )));
            }
        }
        stmt.execute(params![
            column.id,
            table_id,
            column.name.as_str(),
            column.data_type.as_str(),
            position as i64,
            column.created_at,
        ])?;
    }
    Ok(())
}

fn column_owner(conn: &Connection, column_id: ColumnId) -> RepoResult<Option<TableId>> {
    Ok(conn
        .query_row(
            "SELECT table_id FROM table_columns WHERE id = ?1;",
            [column_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn load_columns(conn: &Connection, table_id: TableId) -> RepoResult<Vec<TableColumn>> {
    let mut stmt = conn.prepare(&format!(
        "{COLUMN_SELECT_SQL} WHERE table_id = ?1 ORDER BY position ASC, id ASC;"
    ))?;
    let mut rows = stmt.query([table_id])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(parse_column_row(row)?);
    }
    Ok(columns)
}

fn parse_table_row(row: &Row<'_>) -> RepoResult<NoteTable> {
    Ok(NoteTable {
        id: Some(row.get::<_, TableId>("id")?),
        note_id: Some(row.get::<_, NoteId>("note_id")?),
        name: row.get("name")?,
        columns: Vec::new(),
        rows_json: row.get("rows_json")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_column_row(row: &Row<'_>) -> RepoResult<TableColumn> {
    let type_text: String = row.get("data_type")?;
    let data_type = ColumnType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid column type `{type_text}` in table_columns.data_type"
        ))
    })?;
    Ok(TableColumn {
        id: Some(row.get::<_, ColumnId>("id")?),
        table_id: Some(row.get::<_, TableId>("table_id")?),
        name: row.get("name")?,
        data_type,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
