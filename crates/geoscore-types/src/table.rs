//! Captured query results as immutable row matrices.

use geoscore_error::{GeoscoreError, Result};

use crate::value::CellValue;

/// The tabular result of executing a single SQL statement.
///
/// Invariant: every row has exactly `columns.len()` values; the constructor
/// rejects anything else. Duplicate column names are disambiguated at capture
/// time (`name`, `name_1`, `name_2`, …) so columns stay addressable by name.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularResult {
    /// Build a result, enforcing the row-arity invariant and deduplicating
    /// column names.
    ///
    /// # Errors
    ///
    /// Returns `GeoscoreError::RowArity` if any row disagrees with the
    /// declared column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(GeoscoreError::RowArity {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            columns: dedup_column_names(columns),
            rows,
        })
    }

    /// An empty result with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order.
    #[must_use]
    pub fn column_values(&self, idx: usize) -> Vec<CellValue> {
        self.rows.iter().map(|r| r[idx].clone()).collect()
    }

    /// Case-insensitive lookup of a column index by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Disambiguate repeated column names in capture order.
fn dedup_column_names(columns: Vec<String>) -> Vec<String> {
    let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut out = Vec::with_capacity(columns.len());
    for c in columns {
        match seen.get_mut(&c) {
            None => {
                seen.insert(c.clone(), 0);
                out.push(c);
            }
            Some(n) => {
                *n += 1;
                out.push(format!("{c}_{n}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_owned())
    }

    #[test]
    fn test_row_arity_enforced() {
        let err = TabularResult::new(
            vec!["a".to_owned(), "b".to_owned()],
            vec![vec![text("1")]],
        );
        assert!(matches!(err, Err(GeoscoreError::RowArity { expected: 2, actual: 1 })));
    }

    #[test]
    fn test_duplicate_columns_renamed() {
        let t = TabularResult::new(
            vec!["geom".to_owned(), "geom".to_owned(), "geom".to_owned()],
            vec![],
        )
        .unwrap();
        assert_eq!(t.columns(), ["geom", "geom_1", "geom_2"]);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let t = TabularResult::new(
            vec!["Name".to_owned()],
            vec![vec![text("x")]],
        )
        .unwrap();
        assert_eq!(t.column_index("name"), Some(0));
        assert_eq!(t.column_index("missing"), None);
    }

    #[test]
    fn test_column_values_in_row_order() {
        let t = TabularResult::new(
            vec!["a".to_owned(), "b".to_owned()],
            vec![
                vec![text("1"), text("x")],
                vec![text("2"), text("y")],
            ],
        )
        .unwrap();
        assert_eq!(t.column_values(1), vec![text("x"), text("y")]);
    }
}
