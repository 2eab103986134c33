//! FROM/JOIN table and alias scanning.
//!
//! This is a lexical pass, not a name-resolution pass: it has no notion of
//! subquery scope, CTEs, or shadowing. It records every `FROM`/`JOIN`
//! target in first-seen order and maps each spelling of it (qualified name,
//! bare name, alias) to the base table, which is the last dotted segment.

use std::collections::HashMap;

use crate::scan::{is_reserved, read_ident, skip_whitespace, word_at};

/// Tables referenced by a statement, plus every name that resolves to them.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    order: Vec<String>,
    map: HashMap<String, String>,
}

impl AliasMap {
    /// Base table names in first-seen SQL order.
    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.order
    }

    /// Resolve a table name, qualified spelling, or alias to its base table.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    fn bind(&mut self, spelling: &str, base: &str) {
        self.map.insert(spelling.to_owned(), base.to_owned());
    }
}

/// Scan `FROM`/`JOIN` clauses and build the alias map.
#[must_use]
pub fn parse_tables_with_aliases(sql: &str) -> AliasMap {
    let bytes = sql.as_bytes();
    let mut out = AliasMap::default();
    let mut i = 0;

    while i < bytes.len() {
        let keyword_len = if word_at(bytes, i, "from") {
            4
        } else if word_at(bytes, i, "join") {
            4
        } else {
            i += 1;
            continue;
        };
        i += keyword_len;
        let pos = skip_whitespace(bytes, i);
        let Some((raw_table, after)) = read_dotted_name(bytes, pos) else {
            continue;
        };
        i = after;

        let base = raw_table
            .rsplit('.')
            .next()
            .unwrap_or(raw_table.as_str())
            .to_owned();
        if !out.order.contains(&base) {
            out.order.push(base.clone());
        }
        out.bind(&base, &base);
        out.bind(&raw_table, &base);

        if let Some((alias, after_alias)) = read_alias(bytes, after) {
            out.bind(&alias, &base);
            i = after_alias;
        }
    }

    out
}

/// A possibly dotted, optionally `"`- or `` ` ``-quoted table name.
fn read_dotted_name(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    let quote = matches!(bytes.get(pos), Some(b'"' | b'`')).then(|| bytes[pos]);
    let start = pos + usize::from(quote.is_some());
    let (first, mut end) = read_ident(bytes, start)?;
    let mut name = first;
    while bytes.get(end) == Some(&b'.') {
        let Some((part, next)) = read_ident(bytes, end + 1) else {
            break;
        };
        name.push('.');
        name.push_str(&part);
        end = next;
    }
    if let Some(q) = quote {
        if bytes.get(end) != Some(&q) {
            return None;
        }
        end += 1;
    }
    Some((name, end))
}

/// An optional `AS`-prefixed or bare alias after a table name. Reserved
/// words are never taken as bare aliases, so `FROM t WHERE …` binds none.
fn read_alias(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    let pos = skip_whitespace(bytes, pos);
    if word_at(bytes, pos, "as") {
        let after_as = skip_whitespace(bytes, pos + 2);
        return read_ident(bytes, after_as);
    }
    let (ident, end) = read_ident(bytes, pos)?;
    if is_reserved(&ident) {
        return None;
    }
    Some((ident, end))
}
