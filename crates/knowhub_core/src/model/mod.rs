//! Domain model for folders, notes and typed note tables.
//!
//! # Invariants
//! - Identities (`FolderId`, `NoteId`, `TableId`, `ColumnId`) and timestamps
//!   are assigned by storage, never by callers.
//! - Owned collections (child folders, folder notes) are views built by
//!   `tree::FolderTree`, not authoritative storage.

pub mod folder;
pub mod item;
pub mod note;
pub mod table;
pub mod tree;
pub mod validation;
