//! Byte-level lexical helpers shared by the catalog, alias, and extraction
//! scanners. These are deliberately not a SQL lexer: each caller scans for
//! the narrow shape it needs and ignores everything else.

/// SQL keywords that are never column names, table names, or aliases.
pub(crate) const RESERVED: &[&str] = &[
    "select", "as", "distinct", "case", "when", "then", "else", "end", "null", "true", "false",
    "limit", "offset", "from", "where", "group", "by", "order", "having", "asc", "desc", "on",
    "join", "left", "right", "inner", "outer", "full", "cross", "union", "all",
];

pub(crate) fn is_reserved(token: &str) -> bool {
    RESERVED.iter().any(|kw| token.eq_ignore_ascii_case(kw))
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub(crate) fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Read the identifier starting at `pos`, or `None` if none starts there.
pub(crate) fn read_ident(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    if pos >= bytes.len() || !is_ident_start(bytes[pos]) {
        return None;
    }
    let mut end = pos + 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    Some((String::from_utf8_lossy(&bytes[pos..end]).into_owned(), end))
}

pub(crate) fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Whether `word` occurs at `pos` as a whole word, case-insensitively.
pub(crate) fn word_at(bytes: &[u8], pos: usize, word: &str) -> bool {
    let end = pos + word.len();
    if end > bytes.len() {
        return false;
    }
    if pos > 0 && is_ident_char(bytes[pos - 1]) {
        return false;
    }
    if end < bytes.len() && is_ident_char(bytes[end]) {
        return false;
    }
    bytes[pos..end].eq_ignore_ascii_case(word.as_bytes())
}

/// Blank out block comments, line comments, and single-quoted string
/// literals so reference scanning never hits text inside them. Each erased
/// region collapses to a single space; everything else is preserved
/// byte-for-byte.
pub(crate) fn sanitize(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                out.push(' ');
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
                out.push(' ');
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        // Doubled quote is an escaped quote inside the literal.
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                out.push(' ');
            }
            b => {
                out.push(b as char);
                i += 1;
            }
        }
    }
    out
}
