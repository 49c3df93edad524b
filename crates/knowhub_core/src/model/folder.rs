//! Folder domain model.
//!
//! # Invariants
//! - `id` is assigned by storage on first persist and never reused.
//! - Parent references form a forest; child collections are materialized by
//!   `FolderTree`, never stored on the record.

use super::validation::{check_required_text, ValidationErrors, FOLDER_NAME_MAX_CHARS};
use serde::{Deserialize, Serialize};

/// Storage-assigned folder identity.
pub type FolderId = i64;

/// Persisted folder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    /// Non-empty, at most 100 characters.
    pub name: String,
    /// `None` means root-level folder.
    pub parent_folder_id: Option<FolderId>,
    /// Epoch ms, set by storage.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch ms, refreshed by storage on every write.
    #[serde(default)]
    pub updated_at: i64,
}

impl Folder {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_folder_name(&self.name)
    }
}

/// Validates a folder name before create/rename.
pub fn validate_folder_name(name: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_required_text(
        &mut errors,
        "folder.name",
        "Folder name",
        name,
        FOLDER_NAME_MAX_CHARS,
    );
    errors.into_result()
}
