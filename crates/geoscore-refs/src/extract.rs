//! Table/column reference extraction.
//!
//! Given a SQL statement and a [`SchemaCatalog`], recover which declared
//! tables and columns the statement touches. Qualified `x.y` references
//! resolve `x` through the alias map; bare identifiers are attributed to the
//! unique in-scope table declaring them, and dropped when two tables both
//! declare the name (drop, never guess). Schema-management function calls
//! such as `AddGeometryColumn('t', 'geom', …)` name their table and column
//! in string arguments at fixed positions, so they get a dedicated scan that
//! survives literal stripping.

use geoscore_types::record::TableReference;

use crate::alias::{parse_tables_with_aliases, AliasMap};
use crate::catalog::SchemaCatalog;
use crate::scan::{is_ident_char, is_reserved, read_ident, sanitize, skip_whitespace};

/// Positional signature of one schema-management function.
///
/// `table_args` lists candidate argument-index combinations, tried in order:
/// a one-element combo names the table directly, a two-element combo is
/// `(schema, table)` and the second element is the table. `col_args` are the
/// indices that may carry column names.
struct MgmtSignature {
    name: &'static str,
    table_args: &'static [&'static [usize]],
    col_args: &'static [usize],
}

const MANAGEMENT_FUNCS: &[MgmtSignature] = &[
    MgmtSignature {
        name: "dropgeometrytable",
        table_args: &[&[0], &[0, 1]],
        col_args: &[],
    },
    MgmtSignature {
        name: "addgeometrycolumn",
        table_args: &[&[0], &[0, 1]],
        col_args: &[1, 2],
    },
    MgmtSignature {
        name: "dropgeometrycolumn",
        table_args: &[&[0], &[0, 1]],
        col_args: &[1, 2],
    },
    MgmtSignature {
        name: "find_srid",
        table_args: &[&[0, 1]],
        col_args: &[2],
    },
    MgmtSignature {
        name: "recovergeometrycolumn",
        table_args: &[&[0, 1]],
        col_args: &[2],
    },
    MgmtSignature {
        name: "populate_geometry_columns",
        table_args: &[&[0]],
        col_args: &[],
    },
    MgmtSignature {
        name: "updategeometrysrid",
        table_args: &[&[0], &[0, 1]],
        col_args: &[1, 2],
    },
    MgmtSignature {
        name: "st_estimatedextent",
        table_args: &[&[0]],
        col_args: &[1],
    },
];

/// Extract the ordered table/column references of one SQL statement.
///
/// FROM/JOIN tables come first in SQL order; tables named only by
/// management functions are appended. Every catalog table in scope appears
/// in the output even when no column of it was referenced.
#[must_use]
pub fn extract_references(sql: &str, catalog: &SchemaCatalog) -> Vec<TableReference> {
    let aliases = parse_tables_with_aliases(sql);
    let mgmt = find_management_refs(sql, catalog);

    let mut scope: Vec<String> = aliases.tables().to_vec();
    for (table, _) in &mgmt {
        if !scope.contains(table) {
            scope.push(table.clone());
        }
    }

    let clean = sanitize(sql);
    let mut columns_by_table: Vec<Vec<String>> = vec![Vec::new(); scope.len()];

    for (left, col) in find_qualified_columns(&clean) {
        let Some(base) = aliases.resolve(&left) else {
            continue;
        };
        let declared = catalog.columns(base).is_some_and(|cols| cols.contains(&col));
        if !declared {
            continue;
        }
        if let Some(idx) = scope.iter().position(|t| t == base) {
            if !columns_by_table[idx].contains(&col) {
                columns_by_table[idx].push(col);
            }
        }
    }

    for token in find_bare_identifiers(&clean) {
        if aliases.contains(&token) {
            continue;
        }
        let owners: Vec<usize> = scope
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                catalog
                    .columns(t)
                    .is_some_and(|cols| cols.contains(&token))
            })
            .map(|(idx, _)| idx)
            .collect();
        // Ambiguous ownership drops the token rather than guessing.
        if let [idx] = owners[..] {
            if !columns_by_table[idx].contains(&token) {
                columns_by_table[idx].push(token);
            }
        } else if owners.len() > 1 {
            tracing::trace!(token, "bare column owned by multiple tables, dropped");
        }
    }

    let mut out: Vec<TableReference> = Vec::new();
    for (idx, table) in scope.iter().enumerate() {
        let columns = std::mem::take(&mut columns_by_table[idx]);
        if !columns.is_empty() || catalog.contains(table) {
            out.push(TableReference {
                table: table.clone(),
                columns,
            });
        }
    }

    for (table, cols) in mgmt {
        let idx = match out.iter().position(|r| r.table == table) {
            Some(idx) => idx,
            None => {
                out.push(TableReference {
                    table,
                    columns: Vec::new(),
                });
                out.len() - 1
            }
        };
        for col in cols {
            if !out[idx].columns.contains(&col) {
                out[idx].columns.push(col);
            }
        }
    }

    out
}

/// `left.right` identifier pairs, whitespace allowed around the dot, either
/// side optionally double-quoted.
fn find_qualified_columns(clean: &str) -> Vec<(String, String)> {
    let bytes = clean.as_bytes();
    let mut hits = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let Some((left, after_left)) = read_quoted_ident(bytes, i) else {
            i += 1;
            continue;
        };
        let dot = skip_whitespace(bytes, after_left);
        if bytes.get(dot) != Some(&b'.') {
            i = after_left;
            continue;
        }
        let right_start = skip_whitespace(bytes, dot + 1);
        let Some((right, after_right)) = read_quoted_ident(bytes, right_start) else {
            i = after_left;
            continue;
        };
        hits.push((left, right));
        i = after_right;
    }
    hits
}

/// Bare identifiers in first-seen order: not reserved, not preceded by a
/// dot, and not a function call (no `(` after optional whitespace).
fn find_bare_identifiers(clean: &str) -> Vec<String> {
    let bytes = clean.as_bytes();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let Some((token, end)) = read_ident(bytes, i) else {
            i += 1;
            continue;
        };
        let preceded_by_dot = i > 0 && bytes[i - 1] == b'.';
        let call = bytes.get(skip_whitespace(bytes, end)) == Some(&b'(');
        if !preceded_by_dot && !call && !is_reserved(&token) && !out.contains(&token) {
            out.push(token);
        }
        i = end;
    }
    out
}

fn read_quoted_ident(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    if pos > 0 && (is_ident_char(bytes[pos - 1]) || bytes[pos - 1] == b'.') {
        return None;
    }
    if bytes.get(pos) == Some(&b'"') {
        let (name, end) = read_ident(bytes, pos + 1)?;
        (bytes.get(end) == Some(&b'"')).then_some((name, end + 1))
    } else {
        read_ident(bytes, pos)
    }
}

/// Scan for management-function calls and collect their (table, columns)
/// references, keeping only tables and columns the catalog declares. Scans
/// the raw SQL: the references live inside string literals.
fn find_management_refs(sql: &str, catalog: &SchemaCatalog) -> Vec<(String, Vec<String>)> {
    let bytes = sql.as_bytes();
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let Some((name, after_name)) = read_ident(bytes, i) else {
            i += 1;
            continue;
        };
        let open = skip_whitespace(bytes, after_name);
        if bytes.get(open) != Some(&b'(') {
            i = after_name;
            continue;
        }
        let lowered = name.to_ascii_lowercase();
        let Some(sig) = MANAGEMENT_FUNCS.iter().find(|s| s.name == lowered) else {
            i = open + 1;
            continue;
        };

        let (args_blob, after_call) = call_arguments(bytes, open + 1);
        let args = split_args_top(&args_blob);
        i = after_call;

        let Some(table) = pick_table_arg(sig, &args) else {
            continue;
        };
        if !catalog.contains(&table) {
            continue;
        }
        let valid = catalog.columns(&table).unwrap_or(&[]);
        let idx = match out.iter().position(|(t, _)| t == &table) {
            Some(idx) => idx,
            None => {
                out.push((table, Vec::new()));
                out.len() - 1
            }
        };
        for &k in sig.col_args {
            let Some(col) = args.get(k).and_then(|a| unquote_string(a)) else {
                continue;
            };
            if valid.contains(&col) && !out[idx].1.contains(&col) {
                out[idx].1.push(col);
            }
        }
    }

    out
}

/// The argument blob between the call's parens, paren-balanced, plus the
/// scan position after the call.
fn call_arguments(bytes: &[u8], start: usize) -> (String, usize) {
    let mut depth = 1;
    let mut j = start;
    while j < bytes.len() && depth > 0 {
        match bytes[j] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        j += 1;
    }
    if depth == 0 {
        (
            String::from_utf8_lossy(&bytes[start..j - 1]).into_owned(),
            j,
        )
    } else {
        (String::new(), j)
    }
}

/// Split a call's arguments on top-level commas, respecting nested parens
/// and single-quoted strings with `''` escapes.
fn split_args_top(blob: &str) -> Vec<String> {
    let bytes = blob.as_bytes();
    let mut args = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let ch = bytes[i] as char;
        if in_string {
            buf.push(ch);
            if ch == '\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    buf.push('\'');
                    i += 1;
                } else {
                    in_string = false;
                }
            }
        } else {
            match ch {
                '\'' => {
                    in_string = true;
                    buf.push(ch);
                }
                '(' => {
                    depth += 1;
                    buf.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    buf.push(ch);
                }
                ',' if depth == 0 => {
                    let piece = buf.trim().to_owned();
                    if !piece.is_empty() {
                        args.push(piece);
                    }
                    buf.clear();
                }
                _ => buf.push(ch),
            }
        }
        i += 1;
    }
    let last = buf.trim();
    if !last.is_empty() {
        args.push(last.to_owned());
    }
    args
}

fn pick_table_arg(sig: &MgmtSignature, args: &[String]) -> Option<String> {
    for combo in sig.table_args {
        let fits = combo.iter().max().map_or(true, |&m| m < args.len());
        if !fits {
            continue;
        }
        match combo {
            [single] => {
                if let Some(t) = unquote_string(&args[*single]) {
                    return Some(t);
                }
            }
            [schema, table] => {
                let s = unquote_string(&args[*schema]);
                let t = unquote_string(&args[*table]);
                if let (Some(_), Some(t)) = (s, t) {
                    return Some(t);
                }
            }
            _ => {}
        }
    }
    None
}

/// The inner text of a single-quoted string argument, with trailing
/// `::regclass`-style casts stripped and `''` unescaped. Non-string
/// arguments yield `None`.
fn unquote_string(arg: &str) -> Option<String> {
    let mut s = arg.trim();
    if let Some(colons) = s.rfind("::") {
        let tail = s[colons + 2..].trim();
        if !tail.is_empty() && tail.bytes().all(is_ident_char) {
            s = s[..colons].trim_end();
        }
    }
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(sql: &str, schema: &str) -> Vec<TableReference> {
        extract_references(sql, &SchemaCatalog::parse(schema))
    }

    #[test]
    fn test_qualified_reference() {
        let out = refs("SELECT t1.id FROM t1", "#t1(id, geom)");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].table, "t1");
        assert_eq!(out[0].columns, ["id"]);
    }

    #[test]
    fn test_bare_column_with_single_owner() {
        let out = refs("SELECT id FROM t1", "#t1(id, geom)");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].table, "t1");
        assert_eq!(out[0].columns, ["id"]);
    }

    #[test]
    fn test_ambiguous_bare_column_dropped() {
        let out = refs(
            "SELECT id FROM t1 JOIN t2 ON true",
            "#t1(id, geom)\n#t2(id, name)",
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].columns.is_empty());
        assert!(out[1].columns.is_empty());
    }

    #[test]
    fn test_alias_resolution() {
        let out = refs(
            "SELECT c.name, r.path FROM cities AS c JOIN rivers r ON ST_Intersects(c.geom, r.path)",
            "#cities(id, name, geom)\n#rivers(id, path)",
        );
        assert_eq!(out[0].table, "cities");
        assert_eq!(out[0].columns, ["name", "geom"]);
        assert_eq!(out[1].table, "rivers");
        assert_eq!(out[1].columns, ["path"]);
    }

    #[test]
    fn test_undeclared_column_ignored() {
        let out = refs("SELECT t1.bogus, t1.id FROM t1", "#t1(id)");
        assert_eq!(out[0].columns, ["id"]);
    }

    #[test]
    fn test_literals_do_not_leak_references() {
        let out = refs(
            "SELECT t1.id FROM t1 WHERE name = 'geom'",
            "#t1(id, geom, name)",
        );
        assert_eq!(out[0].columns, ["id", "name"]);
    }

    #[test]
    fn test_management_function_reference() {
        let out = refs(
            "SELECT AddGeometryColumn('parcels', 'geom', 4326, 'POINT', 2)",
            "#parcels(id, geom)",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].table, "parcels");
        assert_eq!(out[0].columns, ["geom"]);
    }

    #[test]
    fn test_management_schema_qualified_form() {
        let out = refs(
            "SELECT Find_SRID('public', 'parcels', 'geom')",
            "#parcels(id, geom)",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].table, "parcels");
        assert_eq!(out[0].columns, ["geom"]);
    }

    #[test]
    fn test_management_table_appended_after_from_tables() {
        let out = refs(
            "SELECT t1.id FROM t1 WHERE Find_SRID('public', 'parcels', 'geom') = 4326",
            "#t1(id)\n#parcels(id, geom)",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].table, "t1");
        assert_eq!(out[1].table, "parcels");
        assert_eq!(out[1].columns, ["geom"]);
    }

    #[test]
    fn test_regclass_cast_stripped() {
        let out = refs(
            "SELECT ST_EstimatedExtent('parcels'::regclass, 'geom')",
            "#parcels(geom)",
        );
        assert_eq!(out[0].table, "parcels");
        assert_eq!(out[0].columns, ["geom"]);
    }

    #[test]
    fn test_from_table_without_columns_still_listed() {
        let out = refs("SELECT 1 FROM t1", "#t1(id)");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].table, "t1");
        assert!(out[0].columns.is_empty());
    }

    #[test]
    fn test_unknown_from_table_dropped() {
        let out = refs("SELECT x.id FROM unknown_t x", "#t1(id)");
        assert!(out.is_empty());
    }

    #[test]
    fn test_function_call_not_a_bare_column() {
        // round(…) must not attribute "round" as a column even if declared.
        let out = refs("SELECT round(area) FROM t1", "#t1(area, round)");
        assert_eq!(out[0].columns, ["area"]);
    }

    #[test]
    fn test_split_args_respects_strings_and_parens() {
        let args = split_args_top("'a,b', foo(1, 2), 'it''s'");
        assert_eq!(args, ["'a,b'", "foo(1, 2)", "'it''s'"]);
    }

    #[test]
    fn test_unquote_string() {
        assert_eq!(unquote_string("'parcels'"), Some("parcels".to_owned()));
        assert_eq!(
            unquote_string(" 'parcels' :: regclass"),
            Some("parcels".to_owned())
        );
        assert_eq!(unquote_string("'it''s'"), Some("it's".to_owned()));
        assert_eq!(unquote_string("4326"), None);
    }
}
