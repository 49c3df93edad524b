//! Typed note tables with schema-on-read rows.
//!
//! # Responsibility
//! - Define column declarations and the cell value union used by rows.
//! - Own the row blob codec (`rows_json`) and the row completeness rule.
//!
//! # Invariants
//! - Rows are an ordered sequence; insertion order survives encode/decode.
//! - `add_row` back-fills every declared column missing from the input with
//!   the column type's default. Extra keys are kept as-is.
//! - Column types are not enforced on write. They are consulted only when a
//!   value is aggregated.
//! - A blob that cannot be decoded is reported as corruption, never replaced
//!   by an empty row list.

use super::note::NoteId;
use super::validation::{
    check_required_text, ValidationErrors, COLUMN_NAME_MAX_CHARS, TABLE_NAME_MAX_CHARS,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned table identity.
pub type TableId = i64;
/// Storage-assigned column identity.
pub type ColumnId = i64;

/// One row: column name -> cell value.
pub type Row = BTreeMap<String, CellValue>;

const EMPTY_ROWS_JSON: &str = "[]";

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Boolean,
}

impl ColumnType {
    /// Storage representation used by `table_columns.data_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Value injected for a column missing from a new row.
    ///
    /// `Date` defaults to the current instant.
    pub fn default_value(self) -> CellValue {
        match self {
            Self::Text => CellValue::Text(String::new()),
            Self::Number => CellValue::Number(0.0),
            Self::Date => CellValue::Date(Utc::now()),
            Self::Boolean => CellValue::Boolean(false),
        }
    }
}

/// A single cell.
///
/// Encoded as plain JSON literals: strings, numbers, booleans, RFC 3339
/// strings for dates and `null` for `Absent`. Every string decodes as
/// `Text` with its bytes untouched; `as_date` interprets it on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Absent,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl CellValue {
    /// Numeric coercion used by aggregates.
    ///
    /// Native numbers and numeric text coerce identically; anything else,
    /// including non-finite values, yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
            Self::Absent | Self::Boolean(_) | Self::Date(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Date view of the cell: native dates, or text holding RFC 3339.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(*value),
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|date| date.with_timezone(&Utc)),
            Self::Absent | Self::Number(_) | Self::Boolean(_) => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(value) => number_to_json(*value),
            Self::Boolean(value) => Value::Bool(*value),
            Self::Date(value) => Value::String(value.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::Absent),
            Value::Bool(value) => Ok(Self::Boolean(value)),
            Value::Number(number) => number
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| format!("number `{number}` is out of range")),
            Value::String(text) => Ok(Self::Text(text)),
            Value::Array(_) => Err("array is not a valid cell value".to_string()),
            Value::Object(_) => Err("object is not a valid cell value".to_string()),
        }
    }
}

// Whole numbers are written without a fraction so blobs stay readable;
// non-finite values have no JSON literal and are stored as absent.
fn number_to_json(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Value::from(value as i64);
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl Display for CellValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Text(text) => write!(f, "{text}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{}", value.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Row blob failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDataError {
    /// Persisted `rows_json` cannot be decoded.
    Corrupt { table: String, message: String },
    /// Rows cannot be encoded back to a blob.
    Encode { table: String, message: String },
}

impl Display for TableDataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corrupt { table, message } => {
                write!(f, "corrupted row data in table `{table}`: {message}")
            }
            Self::Encode { table, message } => {
                write!(f, "cannot encode rows for table `{table}`: {message}")
            }
        }
    }
}

impl Error for TableDataError {}

/// Column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    /// `None` until persisted.
    pub id: Option<ColumnId>,
    pub table_id: Option<TableId>,
    /// Non-empty, at most 100 characters.
    pub name: String,
    pub data_type: ColumnType,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl TableColumn {
    /// Creates an unsaved column declaration.
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            id: None,
            table_id: None,
            name: name.into(),
            data_type,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// A note-owned data table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTable {
    /// `None` until persisted.
    pub id: Option<TableId>,
    pub note_id: Option<NoteId>,
    /// Non-empty, at most 50 characters.
    pub name: String,
    pub columns: Vec<TableColumn>,
    /// Encoded row sequence; use `rows()`/`set_rows()` instead of editing.
    #[serde(default = "empty_rows_json")]
    pub rows_json: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

fn empty_rows_json() -> String {
    EMPTY_ROWS_JSON.to_string()
}

impl NoteTable {
    /// Creates an unsaved, empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            note_id: None,
            name: name.into(),
            columns: Vec::new(),
            rows_json: empty_rows_json(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Creates an unsaved table with the given column declarations.
    pub fn with_columns(name: impl Into<String>, columns: Vec<TableColumn>) -> Self {
        let mut table = Self::new(name);
        table.columns = columns;
        table
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns
            .iter()
            .find(|column| names_match(&column.name, name))
    }

    /// Decodes the row blob.
    pub fn rows(&self) -> Result<Vec<Row>, TableDataError> {
        decode_rows(&self.rows_json).map_err(|message| TableDataError::Corrupt {
            table: self.name.clone(),
            message,
        })
    }

    /// Replaces every row and re-encodes the blob.
    pub fn set_rows(&mut self, rows: &[Row]) -> Result<(), TableDataError> {
        self.rows_json = encode_rows(rows).map_err(|message| TableDataError::Encode {
            table: self.name.clone(),
            message,
        })?;
        Ok(())
    }

    /// Appends one row, back-filling defaults for missing columns.
    pub fn add_row(&mut self, mut values: Row) -> Result<(), TableDataError> {
        let mut rows = self.rows()?;
        for column in &self.columns {
            if !values.contains_key(&column.name) {
                values.insert(column.name.clone(), column.data_type.default_value());
            }
        }
        rows.push(values);
        self.set_rows(&rows)
    }

    /// Declares a new column and back-fills its default into existing rows.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        data_type: ColumnType,
    ) -> Result<(), TableDataError> {
        let column = TableColumn::new(name, data_type);
        let mut rows = self.rows()?;
        for row in &mut rows {
            if !row.contains_key(&column.name) {
                row.insert(column.name.clone(), data_type.default_value());
            }
        }
        self.columns.push(column);
        self.set_rows(&rows)
    }

    /// Drops a column declaration. Row values under that key are left alone.
    pub fn remove_column(&mut self, name: &str) -> Option<TableColumn> {
        let index = self
            .columns
            .iter()
            .position(|column| names_match(&column.name, name))?;
        Some(self.columns.remove(index))
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.validate_at("table")
    }

    pub(crate) fn validate_at(&self, prefix: &str) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(
            &mut errors,
            &format!("{prefix}.name"),
            "Table name",
            &self.name,
            TABLE_NAME_MAX_CHARS,
        );
        for (index, column) in self.columns.iter().enumerate() {
            check_required_text(
                &mut errors,
                &format!("{prefix}.columns[{index}].name"),
                "Column name",
                &column.name,
                COLUMN_NAME_MAX_CHARS,
            );
        }
        errors.into_result()
    }
}

/// Case-insensitive name comparison shared by table and column lookups.
pub(crate) fn names_match(left: &str, right: &str) -> bool {
    left == right || left.to_lowercase() == right.to_lowercase()
}

/// Decodes a row blob into rows. The error string describes the failure.
pub fn decode_rows(rows_json: &str) -> Result<Vec<Row>, String> {
    let raw: Vec<Map<String, Value>> =
        serde_json::from_str(rows_json).map_err(|err| err.to_string())?;
    raw.into_iter()
        .enumerate()
        .map(|(index, object)| {
            object
                .into_iter()
                .map(|(key, value)| {
                    CellValue::from_json(value)
                        .map(|cell| (key.clone(), cell))
                        .map_err(|message| format!("row {index}, key `{key}`: {message}"))
                })
                .collect::<Result<Row, String>>()
        })
        .collect()
}

/// Encodes rows into a blob.
pub fn encode_rows(rows: &[Row]) -> Result<String, String> {
    let raw = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect::<Map<String, Value>>()
        })
        .map(Value::Object)
        .collect::<Vec<_>>();
    serde_json::to_string(&raw).map_err(|err| err.to_string())
}
