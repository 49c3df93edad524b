//! Placeholder resolution for note content.
//!
//! # Responsibility
//! - Find `{{ table.column.aggregate }}` markers in note text.
//! - Replace each marker with a formatted aggregate or an inline diagnostic.
//!
//! # Invariants
//! - Resolution never fails; every problem becomes replacement text.
//! - All markers in one call are answered from the same table snapshot.
//! - Text without markers is returned unchanged.

use crate::aggregate::{aggregate_rows, format_aggregate, AggregateKind};
use crate::model::table::{names_match, ColumnType, NoteTable};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("valid placeholder regex"));

/// Resolves every placeholder in `content` against `tables`.
///
/// Table names match case-insensitively; when several tables share a name
/// the first one in `tables` wins.
pub fn resolve_references(content: &str, tables: &[NoteTable]) -> String {
    if content.is_empty() {
        return String::new();
    }

    PLACEHOLDER_RE
        .replace_all(content, |caps: &Captures<'_>| {
            replacement_for(caps[1].trim(), tables)
        })
        .into_owned()
}

/// Returns whether `content` contains at least one placeholder.
pub fn has_references(content: &str) -> bool {
    PLACEHOLDER_RE.is_match(content)
}

fn replacement_for(reference: &str, tables: &[NoteTable]) -> String {
    let parts = reference.split('.').collect::<Vec<_>>();
    let [table_name, column_name, aggregate_name] = parts.as_slice() else {
        return format!("(Invalid Reference: {reference})");
    };

    let Some(table) = tables
        .iter()
        .find(|table| names_match(&table.name, table_name))
    else {
        return format!("(Table '{table_name}' not found)");
    };

    let Some(column) = table.column(column_name) else {
        return format!("(Column '{column_name}' not found in table '{table_name}')");
    };

    let kind = AggregateKind::parse(aggregate_name);
    if column.data_type != ColumnType::Number && kind != Some(AggregateKind::Count) {
        return format!("(Cannot perform aggregate '{aggregate_name}' on non-numeric column)");
    }

    let Some(kind) = kind else {
        return format!("(Unknown aggregate '{aggregate_name}')");
    };

    let rows = match table.rows() {
        Ok(rows) => rows,
        Err(err) => return format!("(Error processing aggregate: {err})"),
    };

    let value = aggregate_rows(&rows, &column.name, kind);
    if !value.is_finite() {
        return "(Error processing aggregate: result is not a finite number)".to_string();
    }
    format_aggregate(value, kind)
}

#[cfg(test)]
mod tests {
    use super::{has_references, resolve_references};
    use crate::model::table::{CellValue, ColumnType, NoteTable, Row, TableColumn};

    fn sales() -> NoteTable {
        let mut table = NoteTable::with_columns(
            "Sales",
            vec![
                TableColumn::new("Amount", ColumnType::Number),
                TableColumn::new("Name", ColumnType::Text),
            ],
        );
        for amount in [10_i64, 5] {
            let mut row = Row::new();
            row.insert("Amount".to_string(), CellValue::from(amount));
            table.add_row(row).unwrap();
        }
        table
    }

    #[test]
    fn sums_a_numeric_column_case_insensitively() {
        let tables = vec![sales()];
        assert_eq!(resolve_references("{{Sales.Amount.sum}}", &tables), "15");
        assert_eq!(
            resolve_references("Total: {{ sales.AMOUNT.Sum }} items", &tables),
            "Total: 15 items"
        );
        assert_eq!(resolve_references("{{Sales.Amount.avg}}", &tables), "7.5");
        assert_eq!(resolve_references("{{Sales.Name.count}}", &tables), "2");
    }

    #[test]
    fn lookup_and_type_failures_become_inline_text() {
        let tables = vec![sales()];
        assert_eq!(
            resolve_references("{{Sales.Name.sum}}", &tables),
            "(Cannot perform aggregate 'sum' on non-numeric column)"
        );
        assert_eq!(
            resolve_references("{{Unknown.X.sum}}", &tables),
            "(Table 'Unknown' not found)"
        );
        assert_eq!(
            resolve_references("{{Sales.Price.sum}}", &tables),
            "(Column 'Price' not found in table 'Sales')"
        );
        assert_eq!(
            resolve_references("{{Sales.Amount}}", &tables),
            "(Invalid Reference: Sales.Amount)"
        );
        assert_eq!(
            resolve_references("{{Sales.Amount.max}}", &tables),
            "(Unknown aggregate 'max')"
        );
    }

    #[test]
    fn corrupted_rows_are_reported_per_placeholder() {
        let mut broken = sales();
        broken.name = "Broken".to_string();
        broken.rows_json = "not json".to_string();
        let tables = vec![sales(), broken];

        let output = resolve_references("{{Sales.Amount.sum}} / {{Broken.Amount.sum}}", &tables);
        assert!(output.starts_with("15 / (Error processing aggregate: corrupted row data"));
    }

    #[test]
    fn empty_and_marker_free_content_is_unchanged() {
        let tables = vec![sales()];
        assert_eq!(resolve_references("", &tables), "");
        assert_eq!(resolve_references("plain { text }", &tables), "plain { text }");

        let once = resolve_references("sum={{Sales.Amount.sum}}", &tables);
        assert!(!has_references(&once));
        assert_eq!(resolve_references(&once, &tables), once);
    }

    #[test]
    fn unknown_kind_is_reported_even_when_table_is_empty() {
        let empty = NoteTable::with_columns(
            "Empty",
            vec![TableColumn::new("Amount", ColumnType::Number)],
        );
        let tables = vec![empty];
        assert_eq!(
            resolve_references("{{Empty.Amount.max}}", &tables),
            "(Unknown aggregate 'max')"
        );
        assert_eq!(resolve_references("{{Empty.Amount.sum}}", &tables), "0");
    }

    #[test]
    fn repeated_placeholders_resolve_consistently() {
        let tables = vec![sales()];
        assert_eq!(
            resolve_references("{{Sales.Amount.sum}}+{{Sales.Amount.sum}}", &tables),
            "15+15"
        );
    }
}
