//! In-memory tabular dataset.
//!
//! Rows are loosely-typed JSON objects straight off the fetch service;
//! columns are the insertion-ordered union of every key seen. The merge
//! and dedup logic downstream only ever interprets the handful of
//! identifier columns it is configured with; everything else passes
//! through untouched.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

/// One row: arbitrary key/value JSON, exactly as fetched.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Record>,
}

/// Result of an identifier-based dedup pass.
#[derive(Debug)]
pub struct DedupOutcome {
    pub dataset: Dataset,
    pub removed: usize,
    /// True when the identifier column was absent and the input passed
    /// through unchanged.
    pub column_missing: bool,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        let mut ds = Self::new();
        for record in records {
            ds.push(record);
        }
        ds
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Append a row, registering any columns it introduces.
    pub fn push(&mut self, record: Record) {
        for key in record.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(record);
    }

    /// Append all rows of `other` after the current rows. Column order is
    /// preserved: existing columns first, then `other`'s new ones.
    pub fn append(&mut self, other: Dataset) {
        for col in other.columns {
            if !self.has_column(&col) {
                self.columns.push(col);
            }
        }
        self.rows.extend(other.rows);
    }

    /// Set `column` to the same value on every row (registering the column
    /// if new). Used to tag comment batches with their parent post and the
    /// handle under scrape.
    pub fn set_column(&mut self, column: &str, value: Value) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
        for row in &mut self.rows {
            row.insert(column.to_string(), value.clone());
        }
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Canonical string form of a cell, used for identifier comparison.
    /// Strings come back verbatim so `"42"` and `42` collide, which is what
    /// we want: CSV round-trips turn every scalar into a string.
    pub fn cell_str(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Distinct non-empty identifier values in `column`.
    pub fn id_set(&self, column: &str) -> HashSet<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(Self::cell_str)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Drop rows whose `id_column` value has already been seen, keeping the
    /// first occurrence in row order. Rows with no identifier (missing or
    /// empty cell) are always kept; there is nothing to compare them by.
    ///
    /// A dataset without the column at all passes through unchanged with
    /// `column_missing` set; callers surface that as a schema-drift warning
    /// rather than an error.
    pub fn dedupe_by(self, id_column: &str) -> DedupOutcome {
        if !self.has_column(id_column) && !self.is_empty() {
            warn!(
                column = id_column,
                rows = self.len(),
                "Identifier column missing, skipping dedup"
            );
            return DedupOutcome {
                dataset: self,
                removed: 0,
                column_missing: true,
            };
        }

        let before = self.rows.len();
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept = Vec::with_capacity(before);
        for row in self.rows {
            let keep = match row.get(id_column).map(Self::cell_str) {
                Some(id) if !id.is_empty() => seen.insert(id),
                _ => true,
            };
            if keep {
                kept.push(row);
            }
        }

        let removed = before - kept.len();
        DedupOutcome {
            dataset: Dataset {
                columns: self.columns,
                rows: kept,
            },
            removed,
            column_missing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn columns_union_in_first_seen_order() {
        let mut ds = Dataset::new();
        ds.push(record(&[("id", json!("a")), ("text", json!("hi"))]));
        ds.push(record(&[("id", json!("b")), ("likes", json!(3))]));
        assert_eq!(ds.columns(), ["id", "text", "likes"]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut ds = Dataset::new();
        ds.push(record(&[("id", json!("p1")), ("text", json!("old"))]));
        ds.push(record(&[("id", json!("p2")), ("text", json!("other"))]));
        ds.push(record(&[("id", json!("p1")), ("text", json!("refetched"))]));

        let outcome = ds.dedupe_by("id");
        assert_eq!(outcome.removed, 1);
        assert!(!outcome.column_missing);
        assert_eq!(outcome.dataset.len(), 2);
        assert_eq!(
            outcome.dataset.get(0, "text"),
            Some(&json!("old")),
            "historical row wins over the re-fetched one"
        );
    }

    #[test]
    fn dedupe_missing_column_passes_through() {
        let mut ds = Dataset::new();
        ds.push(record(&[("text", json!("no id here"))]));
        ds.push(record(&[("text", json!("none here either"))]));

        let outcome = ds.dedupe_by("id");
        assert!(outcome.column_missing);
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.dataset.len(), 2);
    }

    #[test]
    fn dedupe_keeps_rows_without_identifier() {
        let mut ds = Dataset::new();
        ds.push(record(&[("id", json!("a"))]));
        ds.push(record(&[("id", Value::Null), ("text", json!("x"))]));
        ds.push(record(&[("id", Value::Null), ("text", json!("y"))]));

        let outcome = ds.dedupe_by("id");
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.dataset.len(), 3);
    }

    #[test]
    fn numeric_and_string_ids_collide() {
        let mut ds = Dataset::new();
        ds.push(record(&[("id", json!(42))]));
        ds.push(record(&[("id", json!("42"))]));

        let outcome = ds.dedupe_by("id");
        assert_eq!(outcome.removed, 1);
    }

    #[test]
    fn append_preserves_history_before_fresh() {
        let mut history = Dataset::new();
        history.push(record(&[("id", json!("p1")), ("src", json!("disk"))]));

        let mut fresh = Dataset::new();
        fresh.push(record(&[("id", json!("p1")), ("src", json!("fetch"))]));
        fresh.push(record(&[("id", json!("p2")), ("src", json!("fetch"))]));

        history.append(fresh);
        let outcome = history.dedupe_by("id");
        assert_eq!(outcome.dataset.len(), 2);
        assert_eq!(outcome.dataset.get(0, "src"), Some(&json!("disk")));
    }

    #[test]
    fn set_column_tags_every_row() {
        let mut ds = Dataset::new();
        ds.push(record(&[("id", json!("c1"))]));
        ds.push(record(&[("id", json!("c2"))]));
        ds.set_column("account_handle", json!("acme"));

        assert!(ds.has_column("account_handle"));
        assert_eq!(ds.get(1, "account_handle"), Some(&json!("acme")));
    }
}
