//! Column compatibility graph and maximum bipartite matching.
//!
//! Predicted column naming and order need not mirror the gold query; the
//! only requirement is that *some* injective assignment maps every predicted
//! column onto a row-wise-equivalent gold column.

use std::collections::HashMap;

use geoscore_geom::{
    column_is_geometry, column_passes, compare_geometry_columns, compare_text_columns,
    GeometryOracle,
};
use geoscore_types::record::{ColumnKind, ColumnStats};
use geoscore_types::TabularResult;

/// Outcome of comparing one (predicted, gold) column pair, cached for the
/// lifetime of one evaluation.
#[derive(Debug, Clone)]
pub struct ColumnCompatibility {
    pub equal: bool,
    pub kind: ColumnKind,
    pub stats: ColumnStats,
}

/// Compatibility of every (predicted, gold) column pair plus the adjacency
/// list the matching runs on.
#[derive(Debug)]
pub struct CompatibilityMatrix {
    /// Keyed by `(pred_idx, gold_idx)`.
    pub pairs: HashMap<(usize, usize), ColumnCompatibility>,
    /// For each predicted column, the compatible gold column indices.
    pub adjacency: Vec<Vec<usize>>,
}

/// Compare one column pair: geometry comparison only when *both* columns
/// classify as geometry all-or-nothing, plain text otherwise.
pub fn compare_column_pair<O: GeometryOracle + ?Sized>(
    oracle: &mut O,
    gold: &[geoscore_types::CellValue],
    pred: &[geoscore_types::CellValue],
) -> ColumnCompatibility {
    let is_geometry = column_is_geometry(oracle, gold) && column_is_geometry(oracle, pred);
    let (kind, stats) = if is_geometry {
        (
            ColumnKind::Geometry,
            compare_geometry_columns(oracle, gold, pred),
        )
    } else {
        (ColumnKind::Text, compare_text_columns(gold, pred))
    };
    ColumnCompatibility {
        equal: column_passes(kind, &stats),
        kind,
        stats,
    }
}

/// Build the full compatibility matrix between two normalized results with
/// equal row counts.
pub fn build_compatibility<O: GeometryOracle + ?Sized>(
    oracle: &mut O,
    pred: &TabularResult,
    gold: &TabularResult,
) -> CompatibilityMatrix {
    debug_assert_eq!(pred.n_rows(), gold.n_rows());
    let mut pairs = HashMap::new();
    let mut adjacency = Vec::with_capacity(pred.n_cols());

    for p_idx in 0..pred.n_cols() {
        let p_vals = pred.column_values(p_idx);
        let mut compatible = Vec::new();
        for g_idx in 0..gold.n_cols() {
            let g_vals = gold.column_values(g_idx);
            let cmp = compare_column_pair(oracle, &g_vals, &p_vals);
            if cmp.equal {
                compatible.push(g_idx);
            }
            pairs.insert((p_idx, g_idx), cmp);
        }
        adjacency.push(compatible);
    }

    CompatibilityMatrix { pairs, adjacency }
}

/// Maximum bipartite matching by augmenting-path search.
///
/// Returns, for each predicted column index, the gold column it was assigned
/// to (`None` when no augmenting path covers it).
#[must_use]
pub fn maximum_matching(adjacency: &[Vec<usize>], gold_count: usize) -> Vec<Option<usize>> {
    let mut gold_owner: Vec<Option<usize>> = vec![None; gold_count];

    fn augment(
        p: usize,
        adjacency: &[Vec<usize>],
        gold_owner: &mut Vec<Option<usize>>,
        seen: &mut Vec<bool>,
    ) -> bool {
        for &g in &adjacency[p] {
            if seen[g] {
                continue;
            }
            seen[g] = true;
            if gold_owner[g].is_none()
                || augment(gold_owner[g].unwrap_or(0), adjacency, gold_owner, seen)
            {
                gold_owner[g] = Some(p);
                return true;
            }
        }
        false
    }

    for p in 0..adjacency.len() {
        let mut seen = vec![false; gold_count];
        augment(p, adjacency, &mut gold_owner, &mut seen);
    }

    let mut pred_to_gold = vec![None; adjacency.len()];
    for (g, owner) in gold_owner.iter().enumerate() {
        if let Some(p) = owner {
            pred_to_gold[*p] = Some(g);
        }
    }
    pred_to_gold
}
