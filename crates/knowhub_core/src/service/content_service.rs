//! Content hierarchy use-case service.
//!
//! # Responsibility
//! - Single entry point for folders, notes, tables, search, export/replace
//!   and placeholder resolution.
//! - Validate user input before any persistence attempt.
//! - Emit a `ContentChange` after every committed structural mutation.
//!
//! # Invariants
//! - Moving a folder onto itself is a silent no-op; moving it under one of
//!   its own descendants is rejected with `CycleDetected`.
//! - Renames, moves and deletes of entities that vanished concurrently are
//!   no-ops, not errors.
//! - The cycle check and the move run in separate transactions; a
//!   concurrent move of the same subtree in between is not detected.

use crate::aggregate::aggregate;
use crate::backup::{decode_backup, encode_backup, BackupError};
use crate::model::folder::{validate_folder_name, Folder, FolderId};
use crate::model::item::ContentItem;
use crate::model::note::{validate_note_title, Note, NoteId};
use crate::model::table::{NoteTable, Row, TableDataError, TableId};
use crate::model::tree::FolderTree;
use crate::model::validation::{FieldError, ValidationErrors};
use crate::notify::{ChangeNotifier, ContentChange, SubscriptionId};
use crate::reference::{has_references, resolve_references};
use crate::repo::content_repo::ContentRepository;
use crate::repo::{EntityKind, RepoError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from content service operations.
#[derive(Debug)]
pub enum ContentServiceError {
    /// One or more fields failed validation; nothing was persisted.
    Validation(ValidationErrors),
    FolderNotFound(FolderId),
    NoteNotFound(NoteId),
    TableNotFound(TableId),
    /// Requested parent folder does not exist.
    ParentNotFound(FolderId),
    /// Move would place a folder under its own descendant.
    CycleDetected {
        folder_id: FolderId,
        target_id: FolderId,
    },
    /// Structurally invalid bulk payload (dangling references, duplicate
    /// ids, cycles, undecodable rows).
    InvalidPayload(String),
    /// Persisted row data cannot be decoded.
    DataCorruption(TableDataError),
    /// Backup document could not be encoded or parsed.
    Backup(BackupError),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ContentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "{errors}"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::TableNotFound(id) => write!(f, "table not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent folder not found: {id}"),
            Self::CycleDetected {
                folder_id,
                target_id,
            } => write!(
                f,
                "move would create cycle: folder {folder_id} under folder {target_id}"
            ),
            Self::InvalidPayload(message) => write!(f, "invalid payload: {message}"),
            Self::DataCorruption(err) => write!(f, "{err}"),
            Self::Backup(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::DataCorruption(err) => Some(err),
            Self::Backup(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ContentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: EntityKind::Folder,
                id,
            } => Self::FolderNotFound(id),
            RepoError::NotFound {
                entity: EntityKind::Note,
                id,
            } => Self::NoteNotFound(id),
            RepoError::NotFound {
                entity: EntityKind::Table,
                id,
            } => Self::TableNotFound(id),
            RepoError::TableData(err) => Self::DataCorruption(err),
            RepoError::OwnershipConflict(message) => Self::InvalidPayload(message),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationErrors> for ContentServiceError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<BackupError> for ContentServiceError {
    fn from(value: BackupError) -> Self {
        Self::Backup(value)
    }
}

impl From<TableDataError> for ContentServiceError {
    fn from(value: TableDataError) -> Self {
        Self::DataCorruption(value)
    }
}

pub type ContentResult<T> = Result<T, ContentServiceError>;

/// Whole-dataset export: every note (with tables and columns) and every
/// folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentExport {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
}

/// Content service facade.
pub struct ContentService<R: ContentRepository> {
    repo: R,
    notifier: ChangeNotifier,
}

impl<R: ContentRepository> ContentService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Registers a listener for committed structural mutations.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ContentChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Loads every folder with its direct notes and links them into a forest.
    pub fn list_root_folders(&self) -> ContentResult<FolderTree> {
        let (folders, notes) = self.repo.load_folders_with_notes()?;
        let tree = FolderTree::assemble(folders, notes);
        debug!(
            "event=tree_load module=service status=ok folders={} roots={}",
            tree.len(),
            tree.root_ids().len()
        );
        Ok(tree)
    }

    /// Notes that are not inside any folder.
    pub fn list_root_notes(&self) -> ContentResult<Vec<Note>> {
        Ok(self.repo.list_root_notes()?)
    }

    pub fn create_folder(
        &self,
        name: impl Into<String>,
        parent_folder_id: Option<FolderId>,
    ) -> ContentResult<Folder> {
        let name = name.into();
        validate_folder_name(&name)?;
        if let Some(parent_id) = parent_folder_id {
            self.ensure_folder_exists(parent_id)?;
        }

        let folder = self.repo.create_folder(&name, parent_folder_id)?;
        info!(
            "event=folder_create module=service status=ok folder_id={}",
            folder.id
        );
        self.notifier.notify(ContentChange::FolderCreated(folder.id));
        Ok(folder)
    }

    /// Creates an empty note.
    pub fn create_note(
        &self,
        title: impl Into<String>,
        folder_id: Option<FolderId>,
    ) -> ContentResult<Note> {
        self.add_note(title, String::new(), folder_id)
    }

    /// Creates a note with initial content.
    pub fn add_note(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        folder_id: Option<FolderId>,
    ) -> ContentResult<Note> {
        let title = title.into();
        validate_note_title(&title)?;
        if let Some(folder_id) = folder_id {
            self.ensure_folder_exists(folder_id)?;
        }

        let note = self.repo.create_note(&title, &content.into(), folder_id)?;
        info!(
            "event=note_create module=service status=ok note_id={}",
            note.id
        );
        self.notifier.notify(ContentChange::NoteCreated(note.id));
        Ok(note)
    }

    pub fn rename_folder(
        &self,
        folder_id: FolderId,
        name: impl Into<String>,
    ) -> ContentResult<()> {
        let name = name.into();
        validate_folder_name(&name)?;
        if self.repo.rename_folder(folder_id, &name)? {
            info!("event=folder_rename module=service status=ok folder_id={folder_id}");
            self.notifier.notify(ContentChange::FolderRenamed(folder_id));
        } else {
            warn!("event=folder_rename module=service status=skip reason=missing folder_id={folder_id}");
        }
        Ok(())
    }

    pub fn rename_note(&self, note_id: NoteId, title: impl Into<String>) -> ContentResult<()> {
        let title = title.into();
        validate_note_title(&title)?;
        if self.repo.rename_note(note_id, &title)? {
            info!("event=note_rename module=service status=ok note_id={note_id}");
            self.notifier.notify(ContentChange::NoteRenamed(note_id));
        } else {
            warn!("event=note_rename module=service status=skip reason=missing note_id={note_id}");
        }
        Ok(())
    }

    /// Re-parents a folder; `None` moves it to root level.
    pub fn move_folder(
        &self,
        folder_id: FolderId,
        target_folder_id: Option<FolderId>,
    ) -> ContentResult<()> {
        if target_folder_id == Some(folder_id) {
            debug!("event=folder_move module=service status=skip reason=self_target folder_id={folder_id}");
            return Ok(());
        }
        if let Some(target_id) = target_folder_id {
            if self.is_descendant_or_self(target_id, folder_id)? {
                return Err(ContentServiceError::CycleDetected {
                    folder_id,
                    target_id,
                });
            }
        }

        if self.repo.set_folder_parent(folder_id, target_folder_id)? {
            info!("event=folder_move module=service status=ok folder_id={folder_id}");
            self.notifier.notify(ContentChange::FolderMoved(folder_id));
        } else {
            warn!("event=folder_move module=service status=skip reason=missing folder_id={folder_id}");
        }
        Ok(())
    }

    /// Moves a note into a folder; `None` moves it to root level.
    pub fn move_note(
        &self,
        note_id: NoteId,
        target_folder_id: Option<FolderId>,
    ) -> ContentResult<()> {
        if self.repo.set_note_folder(note_id, target_folder_id)? {
            info!("event=note_move module=service status=ok note_id={note_id}");
            self.notifier.notify(ContentChange::NoteMoved(note_id));
        } else {
            warn!("event=note_move module=service status=skip reason=missing note_id={note_id}");
        }
        Ok(())
    }

    /// Deletes a folder, its descendant folders and every note inside them.
    pub fn delete_folder(&self, folder_id: FolderId) -> ContentResult<()> {
        if self.repo.delete_folder(folder_id)? {
            info!("event=folder_delete module=service status=ok folder_id={folder_id}");
            self.notifier.notify(ContentChange::FolderDeleted(folder_id));
        } else {
            warn!("event=folder_delete module=service status=skip reason=missing folder_id={folder_id}");
        }
        Ok(())
    }

    /// Deletes a note together with its tables and columns.
    pub fn delete_note(&self, note_id: NoteId) -> ContentResult<()> {
        if self.repo.delete_note(note_id)? {
            info!("event=note_delete module=service status=ok note_id={note_id}");
            self.notifier.notify(ContentChange::NoteDeleted(note_id));
        } else {
            warn!("event=note_delete module=service status=skip reason=missing note_id={note_id}");
        }
        Ok(())
    }

    /// Loads a note with tables and columns.
    pub fn get_note(&self, note_id: NoteId) -> ContentResult<Option<Note>> {
        Ok(self.repo.get_note(note_id)?)
    }

    /// Disconnected update: `tables` is the complete desired table set.
    ///
    /// Stored tables missing from `tables` are deleted, the rest are
    /// inserted or replaced. Table or column ids that belong to another
    /// note or table are rejected with `InvalidPayload`. Returns the note as
    /// stored afterwards.
    pub fn update_note(&self, note: &Note, tables: &[NoteTable]) -> ContentResult<Note> {
        let mut errors = match validate_note_title(&note.title) {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        for (index, table) in tables.iter().enumerate() {
            if let Err(table_errors) = table.validate_at(&format!("tables[{index}]")) {
                errors.extend(table_errors);
            }
        }
        errors.into_result()?;

        let mut table_ids = HashSet::new();
        let mut column_ids = HashSet::new();
        for table in tables {
            if let Some(id) = table.id {
                if !table_ids.insert(id) {
                    return Err(invalid_payload(format!(
                        "table id {id} appears more than once"
                    )));
                }
            }
            for column_id in table.columns.iter().filter_map(|column| column.id) {
                if !column_ids.insert(column_id) {
                    return Err(invalid_payload(format!(
                        "column id {column_id} appears more than once"
                    )));
                }
            }
            table.rows().map_err(|err| invalid_payload(err.to_string()))?;
        }
        if let Some(folder_id) = note.folder_id {
            self.ensure_folder_exists(folder_id)?;
        }

        self.repo.update_note(note, tables)?;
        info!(
            "event=note_update module=service status=ok note_id={} tables={}",
            note.id,
            tables.len()
        );
        self.notifier.notify(ContentChange::NoteUpdated(note.id));

        self.repo
            .get_note(note.id)?
            .ok_or(ContentServiceError::NoteNotFound(note.id))
    }

    /// Persists a new table (and its columns) at the end of a note.
    pub fn create_table_for_note(
        &self,
        note_id: NoteId,
        table: &NoteTable,
    ) -> ContentResult<NoteTable> {
        table.validate()?;
        table.rows().map_err(|err| ContentServiceError::InvalidPayload(err.to_string()))?;

        let created = self.repo.create_table(note_id, table)?;
        let table_id = created.id.unwrap_or_default();
        info!("event=table_create module=service status=ok note_id={note_id} table_id={table_id}");
        self.notifier.notify(ContentChange::TableCreated(table_id));
        Ok(created)
    }

    pub fn get_table(&self, table_id: TableId) -> ContentResult<Option<NoteTable>> {
        Ok(self.repo.get_table(table_id)?)
    }

    pub fn get_tables_for_note(&self, note_id: NoteId) -> ContentResult<Vec<NoteTable>> {
        Ok(self.repo.list_tables_for_note(note_id)?)
    }

    pub fn get_all_tables(&self) -> ContentResult<Vec<NoteTable>> {
        Ok(self.repo.list_all_tables()?)
    }

    /// Appends one row (missing columns back-filled) and persists the table.
    pub fn add_table_row(&self, table_id: TableId, values: Row) -> ContentResult<NoteTable> {
        let table = self
            .repo
            .append_row(table_id, values)?
            .ok_or(ContentServiceError::TableNotFound(table_id))?;
        debug!("event=table_add_row module=service status=ok table_id={table_id}");
        self.notifier.notify(ContentChange::TableRowsChanged(table_id));
        Ok(table)
    }

    /// Aggregates one column of a stored table. A missing table yields 0.
    pub fn get_aggregate_value(
        &self,
        table_id: TableId,
        column_name: &str,
        kind: &str,
    ) -> ContentResult<f64> {
        let Some(table) = self.repo.get_table(table_id)? else {
            return Ok(0.0);
        };
        Ok(aggregate(&table, column_name, kind)?)
    }

    /// Resolves every placeholder in `content` against one snapshot of all
    /// tables. Lookup problems become inline text; only a storage failure
    /// is an error.
    pub fn resolve_content(&self, content: &str) -> ContentResult<String> {
        if !has_references(content) {
            return Ok(content.to_string());
        }
        let tables = self.repo.list_all_tables()?;
        Ok(resolve_references(content, &tables))
    }

    /// Case-insensitive substring search over folder names and note
    /// titles/content.
    pub fn search(&self, term: &str) -> ContentResult<Vec<ContentItem>> {
        let items = self.repo.search(term)?;
        debug!(
            "event=search module=service status=ok hits={}",
            items.len()
        );
        Ok(items)
    }

    pub fn get_all_data(&self) -> ContentResult<ContentExport> {
        let (notes, folders) = self.repo.export_all()?;
        Ok(ContentExport { notes, folders })
    }

    /// Swaps the whole dataset for `data`. Nothing is written unless the
    /// payload is valid, and the swap commits as one unit.
    pub fn replace_all(&self, data: &ContentExport) -> ContentResult<()> {
        validate_payload(data)?;
        self.repo.replace_all(&data.notes, &data.folders)?;
        info!(
            "event=replace_all module=service status=ok notes={} folders={}",
            data.notes.len(),
            data.folders.len()
        );
        self.notifier.notify(ContentChange::AllReplaced);
        Ok(())
    }

    /// Exports the whole dataset as a JSON backup document.
    pub fn export_backup(&self) -> ContentResult<Vec<u8>> {
        let export = self.get_all_data()?;
        Ok(encode_backup(&export)?)
    }

    /// Restores a JSON backup document, replacing all current content.
    pub fn import_backup(&self, bytes: &[u8]) -> ContentResult<()> {
        let export = decode_backup(bytes)?;
        self.replace_all(&export)
    }

    fn ensure_folder_exists(&self, folder_id: FolderId) -> ContentResult<()> {
        self.repo
            .get_folder(folder_id)?
            .map(|_| ())
            .ok_or(ContentServiceError::ParentNotFound(folder_id))
    }

    /// Walks from `start` up to the root looking for `ancestor`.
    fn is_descendant_or_self(
        &self,
        start: FolderId,
        ancestor: FolderId,
    ) -> ContentResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            if current == ancestor {
                return Ok(true);
            }
            if !visited.insert(current) {
                return Ok(true);
            }
            cursor = self
                .repo
                .get_folder(current)?
                .and_then(|folder| folder.parent_folder_id);
        }
        Ok(false)
    }
}

fn validate_payload(data: &ContentExport) -> ContentResult<()> {
    let mut errors = ValidationErrors::new();
    for (index, folder) in data.folders.iter().enumerate() {
        if let Err(folder_errors) = folder.validate() {
            errors.extend(prefixed(folder_errors, &format!("folders[{index}]")));
        }
    }
    for (index, note) in data.notes.iter().enumerate() {
        if let Err(note_errors) = note.validate() {
            errors.extend(prefixed(note_errors, &format!("notes[{index}]")));
        }
    }
    errors.into_result()?;

    let mut parents = HashMap::new();
    for folder in &data.folders {
        if parents.insert(folder.id, folder.parent_folder_id).is_some() {
            return Err(invalid_payload(format!("duplicate folder id {}", folder.id)));
        }
    }
    for folder in &data.folders {
        if let Some(parent_id) = folder.parent_folder_id {
            if !parents.contains_key(&parent_id) {
                return Err(invalid_payload(format!(
                    "folder {} references missing parent {parent_id}",
                    folder.id
                )));
            }
        }
        let mut visited = HashSet::from([folder.id]);
        let mut cursor = folder.parent_folder_id;
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(invalid_payload(format!(
                    "folder {} is part of a parent cycle",
                    folder.id
                )));
            }
            cursor = parents.get(&current).copied().flatten();
        }
    }

    let mut note_ids = HashSet::new();
    let mut table_ids = HashSet::new();
    let mut column_ids = HashSet::new();
    for note in &data.notes {
        if !note_ids.insert(note.id) {
            return Err(invalid_payload(format!("duplicate note id {}", note.id)));
        }
        if let Some(folder_id) = note.folder_id {
            if !parents.contains_key(&folder_id) {
                return Err(invalid_payload(format!(
                    "note {} references missing folder {folder_id}",
                    note.id
                )));
            }
        }
        for table in &note.tables {
            if let Some(id) = table.id {
                if !table_ids.insert(id) {
                    return Err(invalid_payload(format!("duplicate table id {id}")));
                }
            }
            for column_id in table.columns.iter().filter_map(|column| column.id) {
                if !column_ids.insert(column_id) {
                    return Err(invalid_payload(format!("duplicate column id {column_id}")));
                }
            }
            table
                .rows()
                .map_err(|err| invalid_payload(err.to_string()))?;
        }
    }
    Ok(())
}

fn invalid_payload(message: String) -> ContentServiceError {
    ContentServiceError::InvalidPayload(message)
}

fn prefixed(errors: ValidationErrors, prefix: &str) -> ValidationErrors {
    ValidationErrors {
        errors: errors
            .errors
            .into_iter()
            .map(|error| FieldError {
                field: format!("{prefix}.{}", error.field),
                message: error.message,
            })
            .collect(),
    }
}
