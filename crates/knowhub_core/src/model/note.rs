//! Note domain model.
//!
//! # Invariants
//! - `id` is assigned by storage on first persist.
//! - `content` is free text and may contain `{{table.column.aggregate}}`
//!   placeholders; resolved output is never written back.
//! - `tables` is only populated by reads that eagerly load tables.

use super::folder::FolderId;
use super::table::NoteTable;
use super::validation::{check_required_text, ValidationErrors, NOTE_TITLE_MAX_CHARS};
use serde::{Deserialize, Serialize};

/// Storage-assigned note identity.
pub type NoteId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Non-empty, at most 200 characters.
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// `None` means the note lives at root level.
    pub folder_id: Option<FolderId>,
    /// Ordered tables; empty unless loaded with tables.
    #[serde(default)]
    pub tables: Vec<NoteTable>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Note {
    /// Validates the note and every attached table.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match validate_note_title(&self.title) {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        for (index, table) in self.tables.iter().enumerate() {
            if let Err(table_errors) = table.validate_at(&format!("tables[{index}]")) {
                errors.extend(table_errors);
            }
        }
        errors.into_result()
    }
}

/// Validates a note title before create/rename.
pub fn validate_note_title(title: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_required_text(
        &mut errors,
        "note.title",
        "Note title",
        title,
        NOTE_TITLE_MAX_CHARS,
    );
    errors.into_result()
}
