//! Deciding whether a scalar value represents geometry.

use geoscore_types::value::{hex_encode, CellValue};

use crate::oracle::{GeometryEncoding, GeometryOracle};

const GEOMETRY_KEYWORDS: &[&str] = &[
    // Longest first so MULTIPOINT is not cut short by POINT.
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "MULTIPOINT",
    "GEOMETRYCOLLECTION",
    "LINESTRING",
    "POLYGON",
    "POINT",
    "MULTI",
];

/// A pure hex string of at least 16 digits, the shortest plausible WKB.
#[must_use]
pub fn is_hex_wkb(value: &str) -> bool {
    value.len() >= 16 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `[SRID=<n>;]KEYWORD[ Z| M| ZM] ( … )`, case-insensitive.
#[must_use]
pub fn is_wkt_literal(value: &str) -> bool {
    let upper = value.trim().to_uppercase();
    let mut rest = upper.as_str();

    if let Some(after) = rest.strip_prefix("SRID=") {
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        match after[digits..].strip_prefix(';') {
            Some(tail) => rest = tail,
            None => return false,
        }
    }

    let Some(keyword) = GEOMETRY_KEYWORDS.iter().find(|k| rest.starts_with(**k)) else {
        return false;
    };
    rest = &rest[keyword.len()..];

    for dim in [" ZM", " Z", " M"] {
        if let Some(tail) = rest.strip_prefix(dim) {
            rest = tail;
            break;
        }
    }

    let rest = rest.trim_start();
    rest.starts_with('(') && rest.contains(')')
}

/// Classify one cell: `Some(raw, encoding)` if it is a geometry candidate.
///
/// Binary cells are hex-encoded and treated as WKB; text cells are matched
/// against the hex-WKB, EWKT-4326, and WKT shapes in that order. Numeric and
/// missing cells are never geometry.
#[must_use]
pub fn cell_encoding(cell: &CellValue) -> Option<(String, GeometryEncoding)> {
    match cell {
        CellValue::Blob(bytes) => Some((hex_encode(bytes), GeometryEncoding::HexWkb)),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if is_hex_wkb(s) {
                Some((s.to_owned(), GeometryEncoding::HexWkb))
            } else if s.to_uppercase().starts_with("SRID=4326;") {
                Some((s.to_owned(), GeometryEncoding::EwktGeography))
            } else if is_wkt_literal(s) || s.to_uppercase().starts_with("SRID=") {
                Some((s.to_owned(), GeometryEncoding::Wkt))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Canonical EWKT of one cell, or `None` when the cell is not geometry or
/// the oracle cannot convert it.
pub fn cell_to_ewkt<O: GeometryOracle + ?Sized>(oracle: &mut O, cell: &CellValue) -> Option<String> {
    let (raw, encoding) = cell_encoding(cell)?;
    match oracle.canonicalize(&raw, encoding) {
        Ok(Some(ewkt)) if !ewkt.is_empty() => Some(ewkt),
        Ok(_) => None,
        Err(detail) => {
            tracing::debug!(%detail, "canonicalization failed, cell treated as non-geometry");
            None
        }
    }
}

/// All-or-nothing geometry test for a whole column.
///
/// Every non-missing value must independently canonicalize; a single
/// non-convertible value demotes the column to plain text. A column with
/// zero non-missing values is text by convention.
pub fn column_is_geometry<O: GeometryOracle + ?Sized>(
    oracle: &mut O,
    values: &[CellValue],
) -> bool {
    let mut any_geometry = false;
    for v in values {
        if v.is_missing() {
            continue;
        }
        if cell_to_ewkt(oracle, v).is_some() {
            any_geometry = true;
        } else {
            return false;
        }
    }
    any_geometry
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Oracle scripted with raw → EWKT answers; anything unscripted fails.
    #[derive(Default)]
    struct ScriptedOracle {
        canonical: HashMap<String, String>,
    }

    impl ScriptedOracle {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                canonical: pairs
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
            }
        }
    }

    impl GeometryOracle for ScriptedOracle {
        fn canonicalize(
            &mut self,
            raw: &str,
            _encoding: GeometryEncoding,
        ) -> Result<Option<String>, String> {
            self.canonical
                .get(raw)
                .map(|s| Some(s.clone()))
                .ok_or_else(|| format!("parse error near {raw}"))
        }

        fn spatially_equal(&mut self, _a: &str, _b: &str) -> Result<bool, String> {
            Ok(false)
        }

        fn z_sequence(&mut self, _ewkt: &str) -> Result<Vec<Option<f64>>, String> {
            Ok(Vec::new())
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_owned())
    }

    #[test]
    fn test_hex_wkb_shape() {
        assert!(is_hex_wkb("0101000020E6100000"));
        assert!(!is_hex_wkb("0101"), "too short");
        assert!(!is_hex_wkb("0101000020E610000Z"), "non-hex digit");
    }

    #[test]
    fn test_wkt_shapes() {
        assert!(is_wkt_literal("POINT(1 1)"));
        assert!(is_wkt_literal("point (1 1)"));
        assert!(is_wkt_literal("SRID=4326;POINT Z (1 1 2)"));
        assert!(is_wkt_literal("MULTIPOLYGON(((0 0,1 0,1 1,0 0)))"));
        assert!(is_wkt_literal("GEOMETRYCOLLECTION(POINT(1 1))"));
        assert!(!is_wkt_literal("POINTLESS(1 1)"));
        assert!(!is_wkt_literal("hello world"));
        assert!(!is_wkt_literal("SRID=;POINT(1 1)"));
        assert!(!is_wkt_literal("POINT 1 1"));
    }

    #[test]
    fn test_encoding_routes() {
        assert_eq!(
            cell_encoding(&text("0101000020E6100000AAAA")).map(|(_, e)| e),
            Some(GeometryEncoding::HexWkb)
        );
        assert_eq!(
            cell_encoding(&text("SRID=4326;POINT(1 1)")).map(|(_, e)| e),
            Some(GeometryEncoding::EwktGeography)
        );
        assert_eq!(
            cell_encoding(&text("SRID=3857;POINT(1 1)")).map(|(_, e)| e),
            Some(GeometryEncoding::Wkt)
        );
        assert_eq!(
            cell_encoding(&text("POINT(1 1)")).map(|(_, e)| e),
            Some(GeometryEncoding::Wkt)
        );
        assert!(cell_encoding(&text("just text")).is_none());
        assert!(cell_encoding(&CellValue::Integer(4326)).is_none());
    }

    #[test]
    fn test_blob_cells_are_hex_wkb() {
        let (raw, enc) = cell_encoding(&CellValue::Blob(vec![0x01, 0x02])).unwrap();
        assert_eq!(raw, "0102");
        assert_eq!(enc, GeometryEncoding::HexWkb);
    }

    #[test]
    fn test_column_all_convertible_is_geometry() {
        let mut oracle = ScriptedOracle::with(&[
            ("POINT(1 1)", "SRID=4326;POINT(1 1)"),
            ("POINT(2 2)", "SRID=4326;POINT(2 2)"),
        ]);
        let col = vec![text("POINT(1 1)"), CellValue::Null, text("POINT(2 2)")];
        assert!(column_is_geometry(&mut oracle, &col));
    }

    #[test]
    fn test_single_opaque_value_demotes_column() {
        let mut oracle = ScriptedOracle::with(&[("POINT(1 1)", "SRID=4326;POINT(1 1)")]);
        let col = vec![text("POINT(1 1)"), text("not a geometry")];
        assert!(!column_is_geometry(&mut oracle, &col));
    }

    #[test]
    fn test_unconvertible_wkt_demotes_column() {
        // Looks like WKT but the oracle rejects it.
        let mut oracle = ScriptedOracle::default();
        let col = vec![text("POINT(borked)")];
        assert!(!column_is_geometry(&mut oracle, &col));
    }

    #[test]
    fn test_all_null_column_is_text_by_convention() {
        let mut oracle = ScriptedOracle::default();
        let col = vec![CellValue::Null, text("  ")];
        assert!(!column_is_geometry(&mut oracle, &col));
        assert!(!column_is_geometry(&mut oracle, &[]));
    }

    proptest! {
        /// Letter case never changes a WKT literal's route, and an SRID
        /// prefix only switches between the geography and plain-WKT routes.
        #[test]
        fn prop_encoding_route_is_case_and_srid_stable(
            kw_idx in 0usize..7,
            x in -180i32..=180,
            y in -90i32..=90,
        ) {
            let kw = GEOMETRY_KEYWORDS[kw_idx];
            let plain = format!("{kw}({x} {y})");
            let lower = plain.to_lowercase();

            prop_assert!(is_wkt_literal(&plain));
            prop_assert!(is_wkt_literal(&lower));
            prop_assert_eq!(
                cell_encoding(&text(&plain)).map(|(_, e)| e),
                Some(GeometryEncoding::Wkt)
            );
            prop_assert_eq!(
                cell_encoding(&text(&lower)).map(|(_, e)| e),
                Some(GeometryEncoding::Wkt)
            );

            prop_assert_eq!(
                cell_encoding(&text(&format!("srid=4326;{lower}"))).map(|(_, e)| e),
                Some(GeometryEncoding::EwktGeography)
            );
            prop_assert_eq!(
                cell_encoding(&text(&format!("SRID=3857;{plain}"))).map(|(_, e)| e),
                Some(GeometryEncoding::Wkt)
            );
        }

        /// Hex-WKB classification is insensitive to digit case.
        #[test]
        fn prop_hex_wkb_route_is_case_stable(hex in "[0-9a-fA-F]{16,40}") {
            prop_assert_eq!(
                cell_encoding(&text(&hex)).map(|(_, e)| e),
                Some(GeometryEncoding::HexWkb)
            );
            prop_assert_eq!(
                cell_encoding(&text(&hex.to_uppercase())).map(|(_, e)| e),
                Some(GeometryEncoding::HexWkb)
            );
        }
    }
}
