//! Aggregate engine over note table rows.
//!
//! # Invariants
//! - `count` is the row count, whatever the column holds.
//! - `sum`/`avg` coerce each value to a number; unusable values add 0.
//! - `avg` divides by the row count, not by the number of numeric values.
//! - An empty table aggregates to 0 for every kind.

use crate::model::table::{NoteTable, Row, TableDataError};
use std::fmt::{Display, Formatter};

/// Supported reducers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Sum,
    Count,
    Avg,
}

impl AggregateKind {
    /// Case-insensitive parse; unknown names return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "avg" => Some(Self::Avg),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Avg => "avg",
        }
    }
}

impl Display for AggregateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates `column_name` of `table` by a textual kind.
///
/// Unknown kinds yield 0. Only a corrupted row blob is an error.
pub fn aggregate(
    table: &NoteTable,
    column_name: &str,
    kind: &str,
) -> Result<f64, TableDataError> {
    let Some(kind) = AggregateKind::parse(kind) else {
        return Ok(0.0);
    };
    let rows = table.rows()?;
    Ok(aggregate_rows(&rows, column_name, kind))
}

/// Aggregates already-decoded rows. `column_name` is matched exactly.
pub fn aggregate_rows(rows: &[Row], column_name: &str, kind: AggregateKind) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }

    match kind {
        AggregateKind::Count => rows.len() as f64,
        AggregateKind::Sum => column_sum(rows, column_name),
        AggregateKind::Avg => column_sum(rows, column_name) / rows.len() as f64,
    }
}

fn column_sum(rows: &[Row], column_name: &str) -> f64 {
    rows.iter()
        .map(|row| {
            row.get(column_name)
                .and_then(|value| value.as_number())
                .unwrap_or(0.0)
        })
        .sum()
}

const FRACTION_DIGITS: usize = 2;

/// Renders an aggregate for inline display.
///
/// `count` renders as an integer; other kinds keep at most two fractional
/// digits with trailing zeros trimmed. Rounding works on the shortest
/// decimal form of the value, half away from zero, so `2.675` renders as
/// `2.68`.
pub fn format_aggregate(value: f64, kind: AggregateKind) -> String {
    if kind == AggregateKind::Count {
        return format!("{}", value as u64);
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let shortest = value.abs().to_string();
    let (whole, fraction) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));
    let mut digits = whole
        .bytes()
        .chain(
            fraction
                .bytes()
                .chain(std::iter::repeat(b'0'))
                .take(FRACTION_DIGITS),
        )
        .map(|digit| digit - b'0')
        .collect::<Vec<u8>>();
    if fraction
        .as_bytes()
        .get(FRACTION_DIGITS)
        .is_some_and(|digit| *digit >= b'5')
    {
        increment(&mut digits);
    }

    let split = digits.len() - FRACTION_DIGITS;
    let whole = render_digits(&digits[..split]);
    let fraction = render_digits(&digits[split..]);
    let fraction = fraction.trim_end_matches('0');
    let magnitude = if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    };

    if value < 0.0 && digits.iter().any(|digit| *digit != 0) {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn increment(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, 1);
}

fn render_digits(digits: &[u8]) -> String {
    digits.iter().map(|digit| char::from(b'0' + digit)).collect()
}

#[cfg(test)]
mod tests {
    use super::{aggregate, aggregate_rows, format_aggregate, AggregateKind};
    use crate::model::table::{CellValue, ColumnType, NoteTable, Row, TableColumn};

    fn amounts(values: &[CellValue]) -> NoteTable {
        let mut table = NoteTable::with_columns(
            "Sales",
            vec![TableColumn::new("Amount", ColumnType::Number)],
        );
        for value in values {
            let mut row = Row::new();
            row.insert("Amount".to_string(), value.clone());
            table.add_row(row).unwrap();
        }
        table
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(AggregateKind::parse("SUM"), Some(AggregateKind::Sum));
        assert_eq!(AggregateKind::parse("Avg"), Some(AggregateKind::Avg));
        assert_eq!(AggregateKind::parse("cOUNT"), Some(AggregateKind::Count));
        assert_eq!(AggregateKind::parse("max"), None);
    }

    #[test]
    fn empty_table_aggregates_to_zero() {
        let table = amounts(&[]);
        for kind in ["sum", "avg", "count"] {
            assert_eq!(aggregate(&table, "Amount", kind).unwrap(), 0.0);
        }
    }

    #[test]
    fn sum_and_avg_treat_text_numbers_like_native_numbers() {
        let table = amounts(&[
            CellValue::Number(10.0),
            CellValue::from("5"),
            CellValue::from("oops"),
            CellValue::Absent,
        ]);
        assert_eq!(aggregate(&table, "Amount", "sum").unwrap(), 15.0);
        assert_eq!(aggregate(&table, "Amount", "avg").unwrap(), 3.75);
        assert_eq!(aggregate(&table, "Amount", "count").unwrap(), 4.0);
    }

    #[test]
    fn count_ignores_column_validity_and_unknown_kind_is_zero() {
        let table = amounts(&[CellValue::from("a"), CellValue::from("b")]);
        assert_eq!(aggregate(&table, "Missing", "count").unwrap(), 2.0);
        assert_eq!(aggregate(&table, "Missing", "sum").unwrap(), 0.0);
        assert_eq!(aggregate(&table, "Amount", "median").unwrap(), 0.0);
    }

    #[test]
    fn rows_missing_the_column_contribute_zero() {
        let rows = vec![Row::new(), Row::new()];
        assert_eq!(aggregate_rows(&rows, "Amount", AggregateKind::Sum), 0.0);
    }

    #[test]
    fn corrupted_rows_are_not_swallowed() {
        let mut table = amounts(&[]);
        table.rows_json = "[1,".to_string();
        assert!(aggregate(&table, "Amount", "sum").is_err());
    }

    #[test]
    fn formatting_trims_to_two_fraction_digits() {
        assert_eq!(format_aggregate(15.0, AggregateKind::Sum), "15");
        assert_eq!(format_aggregate(12.5, AggregateKind::Avg), "12.5");
        assert_eq!(format_aggregate(10.0 / 3.0, AggregateKind::Avg), "3.33");
        assert_eq!(format_aggregate(-0.001, AggregateKind::Sum), "0");
        assert_eq!(format_aggregate(7.0, AggregateKind::Count), "7");
    }

    #[test]
    fn formatting_rounds_decimal_ties_away_from_zero() {
        assert_eq!(format_aggregate(0.125, AggregateKind::Avg), "0.13");
        assert_eq!(format_aggregate(2.675, AggregateKind::Sum), "2.68");
        assert_eq!(format_aggregate(-2.675, AggregateKind::Sum), "-2.68");
        assert_eq!(format_aggregate(1.005, AggregateKind::Sum), "1.01");
        assert_eq!(format_aggregate(9.995, AggregateKind::Sum), "10");
        assert_eq!(format_aggregate(-0.004, AggregateKind::Avg), "0");
        assert_eq!(format_aggregate(0.5, AggregateKind::Avg), "0.5");
    }
}
