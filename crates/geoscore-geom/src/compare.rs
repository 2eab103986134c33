//! Row-wise column comparison under the four equivalence strategies.

use geoscore_types::record::{ColumnKind, ColumnStats};
use geoscore_types::value::CellValue;

use crate::classify::cell_to_ewkt;
use crate::oracle::GeometryOracle;

/// Absolute tolerance for element-wise Z-coordinate comparison.
pub const Z_TOLERANCE: f64 = 1e-6;

/// Compare two geometry-classified columns row by row.
///
/// For every row, both cells are canonicalized and the three geometry
/// strategies counted independently. An oracle failure on one cell fails
/// that strategy for that cell only; the loop always completes.
pub fn compare_geometry_columns<O: GeometryOracle + ?Sized>(
    oracle: &mut O,
    gold: &[CellValue],
    pred: &[CellValue],
) -> ColumnStats {
    debug_assert_eq!(gold.len(), pred.len());
    let mut stats = ColumnStats {
        total_rows: gold.len(),
        ..ColumnStats::default()
    };

    for (g, p) in gold.iter().zip(pred.iter()) {
        let (Some(g_ewkt), Some(p_ewkt)) = (cell_to_ewkt(oracle, g), cell_to_ewkt(oracle, p))
        else {
            continue;
        };

        if g_ewkt.trim().eq_ignore_ascii_case(p_ewkt.trim()) {
            stats.st_astext_pass += 1;
        }

        match oracle.spatially_equal(&g_ewkt, &p_ewkt) {
            Ok(true) => stats.st_equals_pass += 1,
            Ok(false) => {}
            Err(detail) => tracing::debug!(%detail, "ST_Equals strategy failed for cell"),
        }

        match (oracle.z_sequence(&g_ewkt), oracle.z_sequence(&p_ewkt)) {
            (Ok(zg), Ok(zp)) => {
                if z_sequences_match(&zg, &zp) {
                    stats.st_z_pass += 1;
                }
            }
            (Err(detail), _) | (_, Err(detail)) => {
                tracing::debug!(%detail, "Z-sequence strategy failed for cell");
            }
        }
    }
    stats
}

/// Case-insensitive text comparison for non-geometry columns.
#[must_use]
pub fn compare_text_columns(gold: &[CellValue], pred: &[CellValue]) -> ColumnStats {
    debug_assert_eq!(gold.len(), pred.len());
    let mut stats = ColumnStats {
        total_rows: gold.len(),
        ..ColumnStats::default()
    };
    for (g, p) in gold.iter().zip(pred.iter()) {
        if g.matches_text(p) {
            stats.value_match_pass += 1;
        }
    }
    stats
}

/// Same length and element-wise: both 2-D (`None`) or both present within
/// [`Z_TOLERANCE`]. Two purely 2-D geometries therefore compare Z-equal.
#[must_use]
pub fn z_sequences_match(a: &[Option<f64>], b: &[Option<f64>]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => (x - y).abs() <= Z_TOLERANCE,
            _ => false,
        })
}

/// Whether a whole matched column passes, per its classification: geometry
/// passes on exact canonical text OR (spatial equality AND Z agreement) for
/// every row; text passes on value match for every row.
#[must_use]
pub fn column_passes(kind: ColumnKind, stats: &ColumnStats) -> bool {
    let n = stats.total_rows;
    match kind {
        ColumnKind::Geometry => {
            stats.st_astext_pass == n || (stats.st_equals_pass == n && stats.st_z_pass == n)
        }
        ColumnKind::Text => stats.value_match_pass == n,
    }
}
