//! Content repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD and structural operations over folders, notes and note tables.
//! - Whole-dataset export and all-or-nothing replacement.
//!
//! # Invariants
//! - Folder deletion removes the whole subtree, children before parents,
//!   together with every note directly inside any removed folder.
//! - Note deletion cascades to tables and columns via foreign keys.
//! - `update_note` treats the incoming table list as authoritative; table
//!   or column ids owned elsewhere are rejected, never re-parented.
//! - Row appends read and write the blob inside one `IMMEDIATE`
//!   transaction, so concurrent appends never drop a row.
//! - Writes use `IMMEDIATE` transactions; reads that combine several queries
//!   run in one deferred transaction so they see a single snapshot.

use super::schema::ensure_connection_ready;
use super::table_store::{
    delete_tables, insert_table, load_all_tables, load_table, load_tables_for_note,
    table_ids_for_note, update_rows, upsert_table,
};
use super::{EntityKind, RepoError, RepoResult};
use crate::model::folder::{Folder, FolderId};
use crate::model::item::ContentItem;
use crate::model::note::{Note, NoteId};
use crate::model::table::{NoteTable, Row as TableRow, TableId};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;

const FOLDER_SELECT_SQL: &str = "SELECT
    id,
    name,
    parent_folder_id,
    created_at,
    updated_at
FROM folders";

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    folder_id,
    created_at,
    updated_at
FROM notes";

/// Repository interface for the content hierarchy.
///
/// Mutations that target a vanished entity report `false` instead of
/// failing, so callers can treat them as no-ops.
pub trait ContentRepository {
    fn create_folder(&self, name: &str, parent_folder_id: Option<FolderId>)
        -> RepoResult<Folder>;
    fn get_folder(&self, folder_id: FolderId) -> RepoResult<Option<Folder>>;
    /// Loads every folder plus every note that sits inside a folder.
    fn load_folders_with_notes(&self) -> RepoResult<(Vec<Folder>, Vec<Note>)>;
    fn list_root_notes(&self) -> RepoResult<Vec<Note>>;
    fn rename_folder(&self, folder_id: FolderId, name: &str) -> RepoResult<bool>;
    fn set_folder_parent(
        &self,
        folder_id: FolderId,
        parent_folder_id: Option<FolderId>,
    ) -> RepoResult<bool>;
    fn delete_folder(&self, folder_id: FolderId) -> RepoResult<bool>;

    fn create_note(
        &self,
        title: &str,
        content: &str,
        folder_id: Option<FolderId>,
    ) -> RepoResult<Note>;
    /// Loads one note with its tables and columns.
    fn get_note(&self, note_id: NoteId) -> RepoResult<Option<Note>>;
    fn rename_note(&self, note_id: NoteId, title: &str) -> RepoResult<bool>;
    fn set_note_folder(&self, note_id: NoteId, folder_id: Option<FolderId>) -> RepoResult<bool>;
    fn delete_note(&self, note_id: NoteId) -> RepoResult<bool>;
    /// Writes note fields and reconciles its tables against `tables`.
    fn update_note(&self, note: &Note, tables: &[NoteTable]) -> RepoResult<()>;

    fn create_table(&self, note_id: NoteId, table: &NoteTable) -> RepoResult<NoteTable>;
    fn get_table(&self, table_id: TableId) -> RepoResult<Option<NoteTable>>;
    fn list_tables_for_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteTable>>;
    fn list_all_tables(&self) -> RepoResult<Vec<NoteTable>>;
    /// Appends one row (defaults back-filled) in a single write transaction.
    /// Returns `None` when the table does not exist.
    fn append_row(&self, table_id: TableId, values: TableRow) -> RepoResult<Option<NoteTable>>;

    /// Case-insensitive substring match over folder names and note
    /// titles/content. Folders come first.
    fn search(&self, term: &str) -> RepoResult<Vec<ContentItem>>;
    /// Every note (with tables) and every folder.
    fn export_all(&self) -> RepoResult<(Vec<Note>, Vec<Folder>)>;
    /// Deletes all notes and folders, then inserts the given sets, atomically.
    fn replace_all(&self, notes: &[Note], folders: &[Folder]) -> RepoResult<()>;
}

/// SQLite-backed content repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn write_tx(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn read_tx(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Deferred,
        )?)
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn create_folder(
        &self,
        name: &str,
        parent_folder_id: Option<FolderId>,
    ) -> RepoResult<Folder> {
        let tx = self.write_tx()?;
        tx.execute(
            "INSERT INTO folders (name, parent_folder_id) VALUES (?1, ?2);",
            params![name, parent_folder_id],
        )?;
        let folder = load_required_folder(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(folder)
    }

    fn get_folder(&self, folder_id: FolderId) -> RepoResult<Option<Folder>> {
        load_folder(self.conn, folder_id)
    }

    fn load_folders_with_notes(&self) -> RepoResult<(Vec<Folder>, Vec<Note>)> {
        let tx = self.read_tx()?;
        let folders = query_folders(&tx, "ORDER BY id ASC", [])?;
        let notes = query_notes(&tx, "WHERE folder_id IS NOT NULL ORDER BY id ASC", [])?;
        tx.commit()?;
        Ok((folders, notes))
    }

    fn list_root_notes(&self) -> RepoResult<Vec<Note>> {
        query_notes(self.conn, "WHERE folder_id IS NULL ORDER BY id ASC", [])
    }

    fn rename_folder(&self, folder_id: FolderId, name: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE folders
             SET name = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![folder_id, name],
        )?;
        Ok(changed > 0)
    }

    fn set_folder_parent(
        &self,
        folder_id: FolderId,
        parent_folder_id: Option<FolderId>,
    ) -> RepoResult<bool> {
        let tx = self.write_tx()?;
        if let Some(parent_id) = parent_folder_id {
            if !folder_exists(&tx, parent_id)? {
                return Ok(false);
            }
        }
        let changed = tx.execute(
            "UPDATE folders
             SET parent_folder_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![folder_id, parent_folder_id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn delete_folder(&self, folder_id: FolderId) -> RepoResult<bool> {
        let tx = self.write_tx()?;
        if !folder_exists(&tx, folder_id)? {
            return Ok(false);
        }

        for id in subtree_post_order(&tx, folder_id)? {
            tx.execute("DELETE FROM notes WHERE folder_id = ?1;", [id])?;
            tx.execute("DELETE FROM folders WHERE id = ?1;", [id])?;
        }
        tx.commit()?;
        Ok(true)
    }

    fn create_note(
        &self,
        title: &str,
        content: &str,
        folder_id: Option<FolderId>,
    ) -> RepoResult<Note> {
        let tx = self.write_tx()?;
        tx.execute(
            "INSERT INTO notes (title, content, folder_id) VALUES (?1, ?2, ?3);",
            params![title, content, folder_id],
        )?;
        let note_id = tx.last_insert_rowid();
        let note = load_note(&tx, note_id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Note,
            id: note_id,
        })?;
        tx.commit()?;
        Ok(note)
    }

    fn get_note(&self, note_id: NoteId) -> RepoResult<Option<Note>> {
        let tx = self.read_tx()?;
        let Some(mut note) = load_note(&tx, note_id)? else {
            return Ok(None);
        };
        note.tables = load_tables_for_note(&tx, note_id)?;
        tx.commit()?;
        Ok(Some(note))
    }

    fn rename_note(&self, note_id: NoteId, title: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET title = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![note_id, title],
        )?;
        Ok(changed > 0)
    }

    fn set_note_folder(&self, note_id: NoteId, folder_id: Option<FolderId>) -> RepoResult<bool> {
        let tx = self.write_tx()?;
        if let Some(folder_id) = folder_id {
            if !folder_exists(&tx, folder_id)? {
                return Ok(false);
            }
        }
        let changed = tx.execute(
            "UPDATE notes
             SET folder_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![note_id, folder_id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn delete_note(&self, note_id: NoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [note_id])?;
        Ok(changed > 0)
    }

    fn update_note(&self, note: &Note, tables: &[NoteTable]) -> RepoResult<()> {
        let tx = self.write_tx()?;
        let changed = tx.execute(
            "UPDATE notes
             SET title = ?2,
                 content = ?3,
                 folder_id = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![note.id, note.title.as_str(), note.content.as_str(), note.folder_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Note,
                id: note.id,
            });
        }

        let incoming = tables
            .iter()
            .filter_map(|table| table.id)
            .collect::<HashSet<_>>();
        let removed = table_ids_for_note(&tx, note.id)?
            .into_iter()
            .filter(|id| !incoming.contains(id))
            .collect::<Vec<_>>();
        delete_tables(&tx, &removed)?;

        for (position, table) in tables.iter().enumerate() {
            upsert_table(&tx, note.id, position, table)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn create_table(&self, note_id: NoteId, table: &NoteTable) -> RepoResult<NoteTable> {
        let tx = self.write_tx()?;
        if load_note(&tx, note_id)?.is_none() {
            return Err(RepoError::NotFound {
                entity: EntityKind::Note,
                id: note_id,
            });
        }
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM note_tables WHERE note_id = ?1;",
            [note_id],
            |row| row.get(0),
        )?;
        let mut draft = table.clone();
        draft.id = None;
        let table_id = insert_table(&tx, note_id, position.max(0) as usize, &draft)?;
        let created = load_table(&tx, table_id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Table,
            id: table_id,
        })?;
        tx.commit()?;
        Ok(created)
    }

    fn get_table(&self, table_id: TableId) -> RepoResult<Option<NoteTable>> {
        let tx = self.read_tx()?;
        let table = load_table(&tx, table_id)?;
        tx.commit()?;
        Ok(table)
    }

    fn list_tables_for_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteTable>> {
        let tx = self.read_tx()?;
        let tables = load_tables_for_note(&tx, note_id)?;
        tx.commit()?;
        Ok(tables)
    }

    fn list_all_tables(&self) -> RepoResult<Vec<NoteTable>> {
        let tx = self.read_tx()?;
        let tables = load_all_tables(&tx)?;
        tx.commit()?;
        Ok(tables)
    }

    fn append_row(&self, table_id: TableId, values: TableRow) -> RepoResult<Option<NoteTable>> {
        let tx = self.write_tx()?;
        let Some(mut table) = load_table(&tx, table_id)? else {
            return Ok(None);
        };
        table.add_row(values)?;
        update_rows(&tx, table_id, &table.rows_json)?;
        tx.commit()?;
        Ok(Some(table))
    }

    fn search(&self, term: &str) -> RepoResult<Vec<ContentItem>> {
        let needle = term.to_lowercase();
        let tx = self.read_tx()?;
        let folders = query_folders(&tx, "ORDER BY id ASC", [])?;
        let notes = query_notes(&tx, "ORDER BY id ASC", [])?;
        tx.commit()?;

        let mut items = folders
            .into_iter()
            .filter(|folder| folder.name.to_lowercase().contains(&needle))
            .map(ContentItem::Folder)
            .collect::<Vec<_>>();
        items.extend(
            notes
                .into_iter()
                .filter(|note| {
                    note.title.to_lowercase().contains(&needle)
                        || note.content.to_lowercase().contains(&needle)
                })
                .map(ContentItem::Note),
        );
        Ok(items)
    }

    fn export_all(&self) -> RepoResult<(Vec<Note>, Vec<Folder>)> {
        let tx = self.read_tx()?;
        let mut notes = query_notes(&tx, "ORDER BY id ASC", [])?;
        for note in &mut notes {
            note.tables = load_tables_for_note(&tx, note.id)?;
        }
        let folders = query_folders(&tx, "ORDER BY id ASC", [])?;
        tx.commit()?;
        Ok((notes, folders))
    }

    fn replace_all(&self, notes: &[Note], folders: &[Folder]) -> RepoResult<()> {
        let tx = self.write_tx()?;
        // Payload folders may reference each other in any order.
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
        tx.execute("DELETE FROM notes;", [])?;
        tx.execute("DELETE FROM folders;", [])?;

        for folder in folders {
            tx.execute(
                "INSERT INTO folders (id, name, parent_folder_id, created_at, updated_at)
                 VALUES (
                    ?1, ?2, ?3,
                    COALESCE(NULLIF(?4, 0), (strftime('%s', 'now') * 1000)),
                    (strftime('%s', 'now') * 1000)
                 );",
                params![
                    folder.id,
                    folder.name.as_str(),
                    folder.parent_folder_id,
                    folder.created_at,
                ],
            )?;
        }

        for note in notes {
            tx.execute(
                "INSERT INTO notes (id, title, content, folder_id, created_at, updated_at)
                 VALUES (
                    ?1, ?2, ?3, ?4,
                    COALESCE(NULLIF(?5, 0), (strftime('%s', 'now') * 1000)),
                    (strftime('%s', 'now') * 1000)
                 );",
                params![
                    note.id,
                    note.title.as_str(),
                    note.content.as_str(),
                    note.folder_id,
                    note.created_at,
                ],
            )?;
            for (position, table) in note.tables.iter().enumerate() {
                insert_table(&tx, note.id, position, table)?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_folder(conn: &Connection, folder_id: FolderId) -> RepoResult<Option<Folder>> {
    Ok(query_folders(conn, "WHERE id = ?1", [folder_id])?.pop())
}

fn load_required_folder(conn: &Connection, folder_id: FolderId) -> RepoResult<Folder> {
    load_folder(conn, folder_id)?.ok_or(RepoError::NotFound {
        entity: EntityKind::Folder,
        id: folder_id,
    })
}

fn load_note(conn: &Connection, note_id: NoteId) -> RepoResult<Option<Note>> {
    Ok(query_notes(conn, "WHERE id = ?1", [note_id])?.pop())
}

fn query_folders<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> RepoResult<Vec<Folder>> {
    let mut stmt = conn.prepare(&format!("{FOLDER_SELECT_SQL} {tail};"))?;
    let mut rows = stmt.query(params)?;
    let mut folders = Vec::new();
    while let Some(row) = rows.next()? {
        folders.push(parse_folder_row(row)?);
    }
    Ok(folders)
}

fn query_notes<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> RepoResult<Vec<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} {tail};"))?;
    let mut rows = stmt.query(params)?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

/// Folder ids of the subtree rooted at `folder_id`, children before parents.
///
/// Each folder is visited once even if persisted parent links loop.
fn subtree_post_order(conn: &Connection, folder_id: FolderId) -> RepoResult<Vec<FolderId>> {
    let mut stmt = conn.prepare("SELECT id FROM folders WHERE parent_folder_id = ?1 ORDER BY id;")?;
    let mut visited = HashSet::from([folder_id]);
    let mut stack = vec![(folder_id, false)];
    let mut order = Vec::new();

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        stack.push((id, true));
        let mut rows = stmt.query([id])?;
        while let Some(row) = rows.next()? {
            let child: FolderId = row.get(0)?;
            if visited.insert(child) {
                stack.push((child, false));
            }
        }
    }
    Ok(order)
}

fn parse_folder_row(row: &Row<'_>) -> RepoResult<Folder> {
    Ok(Folder {
        id: row.get("id")?,
        name: row.get("name")?,
        parent_folder_id: row.get("parent_folder_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        folder_id: row.get("folder_id")?,
        tables: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn folder_exists(conn: &Connection, folder_id: FolderId) -> RepoResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM folders WHERE id = ?1;", [folder_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}
