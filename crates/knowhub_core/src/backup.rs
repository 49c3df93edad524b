//! JSON backup document codec.
//!
//! # Responsibility
//! - Serialize a full content export to a pretty-printed JSON document.
//! - Parse a backup document back into notes and folders.
//!
//! # Invariants
//! - A document is an object with both `notes` and `folders` keys;
//!   either one missing is a decode error.
//! - Decoding never touches storage; callers hand the result to
//!   `ContentService::replace_all`, which validates it.

use crate::service::content_service::ContentExport;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum BackupError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode backup: {err}"),
            Self::Decode(err) => write!(f, "failed to decode backup: {err}"),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
        }
    }
}

/// Encodes `export` as indented JSON bytes.
pub fn encode_backup(export: &ContentExport) -> Result<Vec<u8>, BackupError> {
    serde_json::to_vec_pretty(export).map_err(BackupError::Encode)
}

/// Parses a backup document.
pub fn decode_backup(bytes: &[u8]) -> Result<ContentExport, BackupError> {
    serde_json::from_slice(bytes).map_err(BackupError::Decode)
}

#[cfg(test)]
mod tests {
    use super::{decode_backup, encode_backup, BackupError};
    use crate::model::folder::Folder;
    use crate::model::note::Note;
    use crate::model::table::{ColumnType, NoteTable, TableColumn};
    use crate::service::content_service::ContentExport;

    fn sample_export() -> ContentExport {
        let mut table = NoteTable::with_columns(
            "Sales",
            vec![TableColumn::new("Amount", ColumnType::Number)],
        );
        table.id = Some(7);
        table.rows_json = r#"[{"Amount":12.5}]"#.to_string();

        ContentExport {
            notes: vec![Note {
                id: 3,
                title: "Q1".to_string(),
                content: "Total: {{Sales.Amount.sum}}".to_string(),
                folder_id: Some(1),
                tables: vec![table],
                created_at: 1_700_000_000_000,
                updated_at: 1_700_000_000_000,
            }],
            folders: vec![Folder {
                id: 1,
                name: "Work".to_string(),
                parent_folder_id: None,
                created_at: 1_700_000_000_000,
                updated_at: 1_700_000_000_000,
            }],
        }
    }

    #[test]
    fn encoded_document_is_indented_and_decodes_to_same_content() {
        let export = sample_export();
        let bytes = encode_backup(&export).expect("encode should succeed");
        let text = String::from_utf8(bytes.clone()).expect("backup should be UTF-8");
        assert!(text.contains("\n  \"notes\""));

        let decoded = decode_backup(&bytes).expect("decode should succeed");
        assert_eq!(decoded, export);
    }

    #[test]
    fn document_without_folders_key_is_rejected() {
        let error = decode_backup(br#"{"notes": []}"#).expect_err("missing key must fail");
        assert!(matches!(error, BackupError::Decode(_)));
        assert!(error.to_string().contains("folders"));
    }

    #[test]
    fn timestamps_default_when_absent() {
        let decoded = decode_backup(
            br#"{"notes": [], "folders": [{"id": 4, "name": "Inbox", "parent_folder_id": null}]}"#,
        )
        .expect("folder without timestamps should decode");
        assert_eq!(decoded.folders[0].created_at, 0);
        assert_eq!(decoded.folders[0].name, "Inbox");
    }
}
