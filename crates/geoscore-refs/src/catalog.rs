//! Schema catalog parsing.
//!
//! Benchmark schema descriptions are plain text of the form
//! `#table_name( col type, "quoted_col" geometry(Point, 4326), … )` with one
//! block per table. Parenthesis balancing gives each block its extent, so
//! nested parens in type definitions are handled; the leading identifier of
//! each top-level comma-separated definition is the column name.

use crate::scan::{read_ident, skip_whitespace};

/// Table-to-columns mapping in declaration order. The first occurrence of a
/// table name wins when duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaCatalog {
    tables: Vec<(String, Vec<String>)>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn parse(schema_text: &str) -> Self {
        let bytes = schema_text.as_bytes();
        let mut tables: Vec<(String, Vec<String>)> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'#' {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                j += 1;
            }
            let Some((name, after_name)) = read_ident(bytes, j) else {
                i += 1;
                continue;
            };
            let open = skip_whitespace(bytes, after_name);
            if bytes.get(open) != Some(&b'(') {
                i = after_name;
                continue;
            }
            let Some(close) = matching_paren(bytes, open) else {
                // Unbalanced block: skip past the opener and keep scanning.
                i = open + 1;
                continue;
            };
            if !tables.iter().any(|(t, _)| t == &name) {
                let columns = parse_column_defs(&schema_text[open + 1..close]);
                tables.push((name, columns));
            }
            i = close + 1;
        }

        Self { tables }
    }

    /// Table names in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(t, _)| t.as_str())
    }

    #[must_use]
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, cols)| cols.as_slice())
    }

    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|(t, _)| t == table)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }
}

/// Index of the `)` matching the `(` at `open`, or `None` if unbalanced.
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 1;
    let mut j = open + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

fn parse_column_defs(blob: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = blob.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                if let Some(col) = leading_column_name(&blob[start..idx]) {
                    columns.push(col);
                }
                start = idx + 1;
            }
            _ => {}
        }
    }
    if let Some(col) = leading_column_name(&blob[start..]) {
        columns.push(col);
    }
    columns
}

/// The leading, optionally `"`- or `` ` ``-quoted identifier of a column
/// definition.
fn leading_column_name(def: &str) -> Option<String> {
    let trimmed = def.trim();
    let bytes = trimmed.as_bytes();
    let pos = usize::from(matches!(bytes.first(), Some(b'"' | b'`')));
    let (name, end) = read_ident(bytes, pos)?;
    // A quoted name must close its quote right after the identifier.
    if pos == 1 && bytes.get(end) != bytes.first() {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_multiple_blocks() {
        let catalog = SchemaCatalog::parse(
            "#cities(id integer, name varchar(80), geom geometry(Point, 4326))\n#rivers(id integer, path geometry(LineString, 4326))",
        );
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.columns("cities").map(<[String]>::to_vec),
            Some(vec!["id".to_owned(), "name".to_owned(), "geom".to_owned()])
        );
        assert_eq!(
            catalog.columns("rivers").map(<[String]>::to_vec),
            Some(vec!["id".to_owned(), "path".to_owned()])
        );
    }

    #[test]
    fn test_nested_type_parens_do_not_split_columns() {
        let catalog = SchemaCatalog::parse("#t(geom geometry(Point, 4326), srid integer)");
        assert_eq!(
            catalog.columns("t").map(<[String]>::to_vec),
            Some(vec!["geom".to_owned(), "srid".to_owned()])
        );
    }

    #[test]
    fn test_quoted_column_names() {
        let catalog = SchemaCatalog::parse("#t(\"OBJECTID\" integer, `shape` geometry)");
        assert_eq!(
            catalog.columns("t").map(<[String]>::to_vec),
            Some(vec!["OBJECTID".to_owned(), "shape".to_owned()])
        );
    }

    #[test]
    fn test_first_table_occurrence_wins() {
        let catalog = SchemaCatalog::parse("#t(a integer)\n#t(b integer)");
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.columns("t").map(<[String]>::to_vec),
            Some(vec!["a".to_owned()])
        );
    }

    #[test]
    fn test_unbalanced_block_is_skipped() {
        let catalog = SchemaCatalog::parse("#broken(a integer\n#ok(b integer)");
        assert!(!catalog.contains("broken"));
        assert!(catalog.contains("ok"));
    }

    #[test]
    fn test_whitespace_after_hash() {
        let catalog = SchemaCatalog::parse("# spaced (x integer)");
        assert_eq!(
            catalog.columns("spaced").map(<[String]>::to_vec),
            Some(vec!["x".to_owned()])
        );
    }
}
