//! Nullable scalar cell values.

use std::fmt;

/// A single scalar captured from a query result.
///
/// Classification as geometry or text is input-driven, not statically typed:
/// the same `Text` cell may hold WKT, hex-encoded WKB, or an opaque string,
/// and the geometry classifier decides per value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CellValue {
    /// SQL NULL.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A UTF-8 text string.
    Text(String),
    /// Raw binary, typically WKB arriving un-hex-encoded.
    Blob(Vec<u8>),
}

impl CellValue {
    /// The trimmed stringification used for case-insensitive value
    /// comparison and canonical row ordering.
    #[must_use]
    pub fn as_comparable(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.trim().to_owned(),
            Self::Blob(b) => hex_encode(b),
        }
    }

    /// Lowercased comparable form, the sort key for canonical row order.
    #[must_use]
    pub fn sort_key(&self) -> String {
        self.as_comparable().to_lowercase()
    }

    /// NULL or empty/whitespace-only text. Missing cells are skipped when
    /// deciding whether a column is geometry.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Case-insensitive trimmed equality, the `value_match` strategy.
    #[must_use]
    pub fn matches_text(&self, other: &Self) -> bool {
        self.as_comparable()
            .eq_ignore_ascii_case(&other.as_comparable())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Blob(b) => write!(f, "X'{}'", hex_encode(b)),
        }
    }
}

/// Hex-encode bytes without pulling in an extra crate.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02X}");
    }
    s
}
