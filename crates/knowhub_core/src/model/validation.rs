//! Per-field validation for user-supplied names and titles.
//!
//! # Invariants
//! - Validation runs before any persistence attempt.
//! - All failing fields are reported together, not just the first one.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum folder name length, in characters.
pub const FOLDER_NAME_MAX_CHARS: usize = 100;
/// Maximum note title length, in characters.
pub const NOTE_TITLE_MAX_CHARS: usize = 200;
/// Maximum table name length, in characters.
pub const TABLE_NAME_MAX_CHARS: usize = 50;
/// Maximum column name length, in characters.
pub const COLUMN_NAME_MAX_CHARS: usize = 100;

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted field path, e.g. `note.title` or `tables[0].columns[1].name`.
    pub field: String,
    pub message: String,
}

/// Collection of field failures produced by a `validate()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns whether `field` has at least one failure.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    pub(crate) fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub(crate) fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>();
        write!(f, "validation failed: {}", parts.join("; "))
    }
}

impl Error for ValidationErrors {}

/// Checks a required, length-bounded text field.
///
/// Whitespace-only values count as missing.
pub(crate) fn check_required_text(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: &str,
    max_chars: usize,
) {
    if value.trim().is_empty() {
        errors.push(field, format!("{label} is required."));
        return;
    }
    if value.chars().count() > max_chars {
        errors.push(
            field,
            format!("{label} cannot be longer than {max_chars} characters."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{check_required_text, ValidationErrors};

    #[test]
    fn blank_and_overlong_values_are_reported_per_field() {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "folder.name", "Folder name", "   ", 100);
        check_required_text(&mut errors, "note.title", "Note title", &"x".repeat(201), 200);
        check_required_text(&mut errors, "table.name", "Table name", "Sales", 50);

        assert_eq!(errors.errors.len(), 2);
        assert!(errors.has_field("folder.name"));
        assert!(errors.has_field("note.title"));
        assert!(!errors.has_field("table.name"));
        assert!(errors.to_string().contains("Folder name is required."));
    }

    #[test]
    fn length_limit_counts_characters_not_bytes() {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "table.name", "Table name", &"é".repeat(50), 50);
        assert!(errors.into_result().is_ok());
    }
}
