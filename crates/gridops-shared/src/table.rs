//! Tabular query results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered named columns by ordered rows. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.push_row(row);
        self
    }

    /// A table with no rows counts as empty regardless of its columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// First `n` rows as column-keyed records.
    pub fn head_records(&self, n: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResultTable {
        ResultTable::new(vec!["date".into(), "load".into()])
            .with_row(vec![json!("2025-06-01"), json!(12.5)])
            .with_row(vec![json!("2025-06-02"), json!(13.0)])
    }

    #[test]
    fn test_push_row_pads_short_rows() {
        let mut table = ResultTable::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![json!(1)]);
        assert_eq!(table.rows[0], vec![json!(1), Value::Null]);
    }

    #[test]
    fn test_column_values() {
        let table = sample();
        assert_eq!(
            table.column_values("load"),
            Some(vec![json!(12.5), json!(13.0)])
        );
        assert_eq!(table.column_values("missing"), None);
    }

    #[test]
    fn test_head_records_bounded() {
        let table = sample();
        let records = table.head_records(1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["date"], json!("2025-06-01"));
    }

    #[test]
    fn test_columns_without_rows_is_empty() {
        let table = ResultTable::new(vec!["total".into()]);
        assert!(table.is_empty());
    }
}
