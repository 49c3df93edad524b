//! Core domain logic for KnowHub.
//! Folders, notes and note-owned data tables with placeholder aggregates.

pub mod aggregate;
pub mod backup;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod reference;
pub mod repo;
pub mod service;

pub use aggregate::{aggregate, aggregate_rows, format_aggregate, AggregateKind};
pub use backup::{decode_backup, encode_backup, BackupError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::folder::{Folder, FolderId};
pub use model::item::{ContentItem, TreeItem};
pub use model::note::{Note, NoteId};
pub use model::table::{
    CellValue, ColumnId, ColumnType, NoteTable, Row, TableColumn, TableDataError, TableId,
};
pub use model::tree::{FolderNode, FolderTree};
pub use model::validation::{FieldError, ValidationErrors};
pub use notify::{ChangeNotifier, ContentChange, SubscriptionId};
pub use reference::resolve_references;
pub use repo::content_repo::{ContentRepository, SqliteContentRepository};
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::content_service::{
    ContentExport, ContentResult, ContentService, ContentServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
