//! SQL recovery from raw model output.
//!
//! Model answers wrap the statement in chain-of-thought markup, markdown
//! fences, or surrounding prose. Recovery tries the most structured shape
//! first and degrades:
//!
//! 1. strip `<think>…</think>` blocks;
//! 2. last fully closed ``` fence (optional `sql` tag);
//! 3. unclosed trailing fence, after shaving stray trailing backticks;
//! 4. last span from a SQL keyword to a semicolon at end of line;
//! 5. last SQL keyword to end of text.
//!
//! An answer with no recoverable SQL yields the empty string.

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "UPDATE", "DELETE", "INSERT", "CREATE", "DROP", "ALTER",
];

/// Recover the final SQL statement from one raw model answer.
#[must_use]
pub fn extract_last_sql(raw: &str) -> String {
    let text = strip_think_blocks(raw);
    let text = text.trim();

    if let Some(sql) = last_closed_fence(text) {
        return sql;
    }
    if let Some(sql) = unclosed_fence(text) {
        return sql;
    }
    if let Some(sql) = last_terminated_statement(text) {
        return sql;
    }
    if let Some(pos) = last_keyword_position(text) {
        return text[pos..].trim().to_owned();
    }
    String::new()
}

fn strip_think_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(open) = find_ci(rest, "<think>", 0) else {
            out.push_str(rest);
            return out;
        };
        let Some(close) = find_ci(rest, "</think>", open + "<think>".len()) else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..open]);
        rest = &rest[close + "</think>".len()..];
    }
}

/// Content of the last fully closed ``` fence, skipping an optional
/// language tag.
fn last_closed_fence(text: &str) -> Option<String> {
    let mut last = None;
    let mut pos = 0;
    while let Some(open) = find_ci(text, "```", pos) {
        let body_start = skip_fence_tag(text, open + 3);
        let Some(close) = find_ci(text, "```", body_start) else {
            break;
        };
        last = Some(text[body_start..close].trim().to_owned());
        pos = close + 3;
    }
    last
}

/// An opening fence with no closer: everything from the fence to the end,
/// ignoring trailing stray backticks.
fn unclosed_fence(text: &str) -> Option<String> {
    let trimmed = text.trim_end_matches('`');
    let open = find_ci(trimmed, "```", 0)?;
    let body_start = skip_fence_tag(trimmed, open + 3);
    Some(trimmed[body_start..].trim().to_owned())
}

fn skip_fence_tag(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    if bytes.len() >= pos + 3 && bytes[pos..pos + 3].eq_ignore_ascii_case(b"sql") {
        pos += 3;
    }
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// The last `KEYWORD … ;` span whose semicolon ends its line.
fn last_terminated_statement(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut last = None;
    let mut pos = 0;
    while let Some(start) = next_keyword_position(text, pos) {
        let Some(semi) = line_final_semicolon(bytes, start) else {
            break;
        };
        last = Some(text[start..=semi].trim().to_owned());
        pos = semi + 1;
    }
    last
}

/// First `;` at or after `from` that is followed only by blanks up to a
/// newline or the end of text.
fn line_final_semicolon(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b';' {
            let mut k = i + 1;
            while k < bytes.len() && matches!(bytes[k], b' ' | b'\t' | b'\r') {
                k += 1;
            }
            if k == bytes.len() || bytes[k] == b'\n' {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn next_keyword_position(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    (from..text.len()).find(|&i| keyword_at(bytes, i))
}

fn last_keyword_position(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..text.len()).rev().find(|&i| keyword_at(bytes, i))
}

fn keyword_at(bytes: &[u8], pos: usize) -> bool {
    if pos > 0 && (bytes[pos - 1].is_ascii_alphanumeric() || bytes[pos - 1] == b'_') {
        return false;
    }
    SQL_KEYWORDS.iter().any(|kw| {
        let end = pos + kw.len();
        end <= bytes.len()
            && bytes[pos..end].eq_ignore_ascii_case(kw.as_bytes())
            && end_is_boundary(bytes, end)
    })
}

fn end_is_boundary(bytes: &[u8], end: usize) -> bool {
    bytes
        .get(end)
        .map_or(true, |&b| !b.is_ascii_alphanumeric() && b != b'_')
}

/// Case-insensitive substring search starting at `from`.
fn find_ci(text: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = text.as_bytes();
    let pat = needle.as_bytes();
    if from > hay.len() || pat.is_empty() {
        return None;
    }
    (from..=hay.len().saturating_sub(pat.len()))
        .find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_fence_preferred() {
        let raw = "Here is the query:\n```sql\nSELECT 1;\n```\nHope that helps!";
        assert_eq!(extract_last_sql(raw), "SELECT 1;");
    }

    #[test]
    fn test_last_fence_wins() {
        let raw = "```sql\nSELECT 1;\n```\nActually, use this:\n```sql\nSELECT 2;\n```";
        assert_eq!(extract_last_sql(raw), "SELECT 2;");
    }

    #[test]
    fn test_fence_without_language_tag() {
        let raw = "```\nSELECT name FROM cities;\n```";
        assert_eq!(extract_last_sql(raw), "SELECT name FROM cities;");
    }

    #[test]
    fn test_think_block_stripped() {
        let raw = "<think>maybe SELECT * FROM wrong;</think>```sql\nSELECT 3;\n```";
        assert_eq!(extract_last_sql(raw), "SELECT 3;");
    }

    #[test]
    fn test_unclosed_fence() {
        let raw = "The answer:\n```sql\nSELECT geom FROM parcels";
        assert_eq!(extract_last_sql(raw), "SELECT geom FROM parcels");
    }

    #[test]
    fn test_unclosed_fence_with_trailing_backticks() {
        let raw = "```sql\nSELECT geom FROM parcels``";
        assert_eq!(extract_last_sql(raw), "SELECT geom FROM parcels");
    }

    #[test]
    fn test_free_text_semicolon_span() {
        let raw = "You should run SELECT count(*) FROM rivers;\nThat counts the rows.";
        assert_eq!(extract_last_sql(raw), "SELECT count(*) FROM rivers;");
    }

    #[test]
    fn test_semicolon_mid_line_not_a_terminator() {
        // The first semicolon is followed by prose on the same line, so the
        // statement ends at the second one.
        let raw = "SELECT 1; or maybe\nSELECT 2;\n";
        assert_eq!(extract_last_sql(raw), "SELECT 1; or maybe\nSELECT 2;");
    }

    #[test]
    fn test_keyword_to_end_fallback() {
        let raw = "I would go with SELECT name\nFROM cities WHERE pop > 10";
        assert_eq!(extract_last_sql(raw), "SELECT name\nFROM cities WHERE pop > 10");
    }

    #[test]
    fn test_keyword_inside_word_ignored() {
        assert_eq!(extract_last_sql("no DROPLET here"), "");
    }

    #[test]
    fn test_nothing_recoverable() {
        assert_eq!(extract_last_sql("I cannot answer that."), "");
    }

    #[test]
    fn test_multiline_statement_in_fence() {
        let raw = "```sql\nSELECT c.name\nFROM cities c\nWHERE ST_X(c.geom) > 0;\n```";
        assert_eq!(
            extract_last_sql(raw),
            "SELECT c.name\nFROM cities c\nWHERE ST_X(c.geom) > 0;"
        );
    }
}
