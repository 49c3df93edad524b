//! Persistence layer for folders, notes and note tables.
//!
//! # Responsibility
//! - Define the `ContentRepository` contract used by the service layer.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - Every operation runs in its own transaction on the borrowed connection
//!   and leaves nothing open after it returns, on success or error.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod content_repo;
mod schema;
mod table_store;

use crate::db::DbError;
use crate::model::table::TableDataError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity kinds used in not-found reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Folder,
    Note,
    Table,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Folder => "folder",
            Self::Note => "note",
            Self::Table => "table",
        })
    }
}

/// Repository error for content persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    NotFound { entity: EntityKind, id: i64 },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Stored row blob of a table cannot be decoded or re-encoded.
    TableData(TableDataError),
    /// Incoming identity already belongs to a different owner.
    OwnershipConflict(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Cascade rules need `PRAGMA foreign_keys = ON`.
    ForeignKeysDisabled,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted content data: {message}"),
            Self::TableData(err) => write!(f, "{err}"),
            Self::OwnershipConflict(message) => write!(f, "ownership conflict: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "content repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "content repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "content repository requires column `{column}` in table `{table}`"
            ),
            Self::ForeignKeysDisabled => {
                write!(f, "content repository requires foreign key enforcement")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::TableData(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<TableDataError> for RepoError {
    fn from(value: TableDataError) -> Self {
        Self::TableData(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
