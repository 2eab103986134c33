//! Row/column normalization ahead of comparison.
//!
//! Queries without an explicit ORDER BY have undefined execution order, so
//! both result sets are put into a stable, content-derived canonical order
//! before any row-wise comparison. Re-normalizing a normalized result is a
//! no-op.

use std::cmp::Ordering;

use geoscore_error::Result;
use geoscore_types::TabularResult;

/// One ORDER BY key as declared in the SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub ascending: bool,
}

/// Recover the top-level ORDER BY keys of a statement, if any.
///
/// The scan tracks parenthesis depth and string/identifier quoting; only the
/// *last* `ORDER BY` at depth zero counts (subquery clauses are invisible),
/// and its extent ends at a top-level `LIMIT`/`OFFSET`, a semicolon, or the
/// end of the text.
#[must_use]
pub fn parse_order_by(sql: &str) -> Vec<OrderKey> {
    let bytes = sql.as_bytes();
    let mut depth: i32 = 0;
    let mut i = 0usize;
    let mut clause_start: Option<usize> = None;
    let mut clause_end = sql.len();

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\''),
            b'"' => i = skip_quoted(bytes, i, b'"'),
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
            }
            b';' if depth == 0 => {
                if clause_start.is_some() && clause_end == sql.len() {
                    clause_end = i;
                }
                i += 1;
            }
            _ => {
                if depth == 0 {
                    if let Some(next) = match_keyword(sql, i, "order") {
                        let after_ws = skip_ws(bytes, next);
                        if let Some(after_by) = match_keyword(sql, after_ws, "by") {
                            clause_start = Some(after_by);
                            clause_end = sql.len();
                            i = after_by;
                            continue;
                        }
                    }
                    if clause_start.is_some() && clause_end == sql.len() {
                        if let Some(next) = match_keyword(sql, i, "limit") {
                            clause_end = i;
                            i = next;
                            continue;
                        }
                        if let Some(next) = match_keyword(sql, i, "offset") {
                            clause_end = i;
                            i = next;
                            continue;
                        }
                    }
                }
                i = skip_word_or_char(bytes, i);
            }
        }
    }

    let Some(start) = clause_start else {
        return Vec::new();
    };
    split_top_level_commas(&sql[start..clause_end])
        .into_iter()
        .filter_map(|part| parse_order_key(part.trim()))
        .collect()
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            // Doubled quote is an escape.
            if i + 1 < bytes.len() && bytes[i + 1] == quote {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// If `sql[i..]` starts with `word` as a whole word (case-insensitive),
/// return the index just past it.
fn match_keyword(sql: &str, i: usize, word: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    if i > 0 && is_word_byte(bytes[i - 1]) {
        return None;
    }
    let end = i + word.len();
    if end > sql.len() || !sql[i..end].eq_ignore_ascii_case(word) {
        return None;
    }
    if end < sql.len() && is_word_byte(bytes[end]) {
        return None;
    }
    Some(end)
}

fn skip_word_or_char(bytes: &[u8], i: usize) -> usize {
    if is_word_byte(bytes[i]) {
        let mut j = i;
        while j < bytes.len() && is_word_byte(bytes[j]) {
            j += 1;
        }
        j
    } else {
        i + 1
    }
}

fn split_top_level_commas(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\''),
            b'"' => i = skip_quoted(bytes, i, b'"'),
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
            }
            b',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    parts.push(&text[start..]);
    parts
}

/// `column [ASC|DESC]` where column may be quoted, backticked, or dotted.
fn parse_order_key(part: &str) -> Option<OrderKey> {
    let name_len = part
        .bytes()
        .take_while(|b| is_word_byte(*b) || matches!(b, b'.' | b'"' | b'`'))
        .count();
    if name_len == 0 {
        return None;
    }
    let column: String = part[..name_len]
        .chars()
        .filter(|c| *c != '"' && *c != '`')
        .collect();
    let rest = part[name_len..].trim();
    let ascending = !rest.eq_ignore_ascii_case("desc");
    // Anything besides a bare ASC/DESC tail (expressions, NULLS LAST, …)
    // makes the key unusable for re-sorting.
    if !rest.is_empty() && !rest.eq_ignore_ascii_case("asc") && !rest.eq_ignore_ascii_case("desc") {
        return None;
    }
    Some(OrderKey { column, ascending })
}

/// Normalize one captured result for comparison.
///
/// 1. exact-duplicate rows are dropped (first occurrence wins);
/// 2. with a usable top-level ORDER BY in `sql`, rows are re-sorted by the
///    declared keys that exist in the result;
/// 3. otherwise columns are sorted alphabetically and rows sorted by their
///    case-insensitive stringified values, column by column.
///
/// # Errors
///
/// Propagates the row-arity error from result reconstruction; unreachable
/// for inputs built through [`TabularResult::new`].
pub fn normalize(result: &TabularResult, sql: Option<&str>) -> Result<TabularResult> {
    if result.n_rows() == 0 && result.n_cols() == 0 {
        return Ok(TabularResult::empty());
    }

    let mut rows: Vec<Vec<geoscore_types::CellValue>> = Vec::with_capacity(result.n_rows());
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for row in result.rows() {
        let key = serde_json::to_string(row)?;
        if seen.insert(key) {
            rows.push(row.clone());
        }
    }

    let order_spec = sql.map(parse_order_by).unwrap_or_default();
    if !order_spec.is_empty() {
        let keys: Vec<(usize, bool)> = order_spec
            .iter()
            .filter_map(|k| result.column_index(&k.column).map(|i| (i, k.ascending)))
            .collect();
        if !keys.is_empty() {
            rows.sort_by(|a, b| {
                for (idx, ascending) in &keys {
                    let ord = a[*idx].sort_key().cmp(&b[*idx].sort_key());
                    let ord = if *ascending { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        return TabularResult::new(result.columns().to_vec(), rows);
    }

    // Canonical order: alphabetical columns, then content-sorted rows.
    let mut col_order: Vec<usize> = (0..result.n_cols()).collect();
    col_order.sort_by(|a, b| result.columns()[*a].cmp(&result.columns()[*b]));

    let columns: Vec<String> = col_order
        .iter()
        .map(|i| result.columns()[*i].clone())
        .collect();
    let mut rows: Vec<Vec<geoscore_types::CellValue>> = rows
        .into_iter()
        .map(|row| col_order.iter().map(|i| row[*i].clone()).collect())
        .collect();
    rows.sort_by(|a, b| {
        for i in 0..a.len() {
            let ord = a[i].sort_key().cmp(&b[i].sort_key());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    TabularResult::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscore_types::CellValue;
    use proptest::prelude::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_owned())
    }

    fn table(cols: &[&str], rows: &[&[&str]]) -> TabularResult {
        TabularResult::new(
            cols.iter().map(|c| (*c).to_owned()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| text(v)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_simple_order_by() {
        let keys = parse_order_by("SELECT * FROM t ORDER BY name DESC, id");
        assert_eq!(
            keys,
            vec![
                OrderKey {
                    column: "name".to_owned(),
                    ascending: false
                },
                OrderKey {
                    column: "id".to_owned(),
                    ascending: true
                },
            ]
        );
    }

    #[test]
    fn test_order_by_inside_subquery_is_ignored() {
        let keys = parse_order_by("SELECT * FROM (SELECT a FROM t ORDER BY a) s");
        assert!(keys.is_empty());
    }

    #[test]
    fn test_last_top_level_order_by_wins() {
        let sql = "SELECT a FROM t ORDER BY a UNION SELECT b FROM u ORDER BY b DESC";
        let keys = parse_order_by(sql);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].column, "b");
        assert!(!keys[0].ascending);
    }

    #[test]
    fn test_order_by_stops_at_limit() {
        let keys = parse_order_by("SELECT a FROM t ORDER BY a, b LIMIT 10");
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_order_by_quoted_and_dotted_columns() {
        let keys = parse_order_by("SELECT * FROM t ORDER BY \"Name\" DESC, t.id ASC");
        assert_eq!(keys[0].column, "Name");
        assert_eq!(keys[1].column, "t.id");
    }

    #[test]
    fn test_order_by_keyword_in_string_literal_ignored() {
        let keys = parse_order_by("SELECT 'order by x' FROM t");
        assert!(keys.is_empty());
    }

    #[test]
    fn test_canonical_sort_without_order_by() {
        let t = table(&["b", "a"], &[&["2", "x"], &["1", "y"], &["2", "x"]]);
        let n = normalize(&t, Some("SELECT b, a FROM t")).unwrap();
        // Columns sorted alphabetically, duplicate row dropped, rows sorted
        // by the "a" column first.
        assert_eq!(n.columns(), ["a", "b"]);
        assert_eq!(n.n_rows(), 2);
        assert_eq!(n.rows()[0], vec![text("x"), text("2")]);
        assert_eq!(n.rows()[1], vec![text("y"), text("1")]);
    }

    #[test]
    fn test_declared_order_preserved() {
        let t = table(&["id", "name"], &[&["1", "b"], &["2", "a"]]);
        let n = normalize(&t, Some("SELECT id, name FROM t ORDER BY name")).unwrap();
        assert_eq!(n.columns(), ["id", "name"]);
        assert_eq!(n.rows()[0][1], text("a"));
        assert_eq!(n.rows()[1][1], text("b"));
    }

    #[test]
    fn test_descending_order_applied() {
        let t = table(&["id"], &[&["1"], &["3"], &["2"]]);
        let n = normalize(&t, Some("SELECT id FROM t ORDER BY id DESC")).unwrap();
        let ids: Vec<String> = n.rows().iter().map(|r| r[0].as_comparable()).collect();
        assert_eq!(ids, ["3", "2", "1"]);
    }

    proptest! {
        /// Re-normalizing a normalized result is a no-op, with or without a
        /// declared ORDER BY, for any small table.
        #[test]
        fn prop_normalize_is_idempotent(
            n_cols in 1usize..4,
            raw_rows in proptest::collection::vec(
                proptest::collection::vec("[a-cA-C]{0,2}", 3),
                0..6,
            ),
            use_order in proptest::bool::ANY,
            descending in proptest::bool::ANY,
        ) {
            let names = ["b", "a", "c"];
            let columns: Vec<String> =
                names[..n_cols].iter().map(|c| (*c).to_owned()).collect();
            let rows: Vec<Vec<CellValue>> = raw_rows
                .iter()
                .map(|r| r[..n_cols].iter().map(|v| text(v)).collect())
                .collect();
            let t = TabularResult::new(columns, rows).unwrap();

            let sql = use_order.then(|| {
                format!(
                    "SELECT * FROM t ORDER BY b {}",
                    if descending { "DESC" } else { "ASC" }
                )
            });

            let once = normalize(&t, sql.as_deref()).unwrap();
            let twice = normalize(&once, sql.as_deref()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_empty_result_stays_empty() {
        let n = normalize(&TabularResult::empty(), Some("SELECT 1")).unwrap();
        assert!(n.is_empty());
        assert_eq!(n.n_cols(), 0);
    }
}
