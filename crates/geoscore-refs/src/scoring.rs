//! Hit-rate scoring of predicted extractions against gold extractions.
//!
//! Table and column hits are micro-averaged over all records whose key
//! appears in both sets; a gold record with no predicted counterpart is
//! counted in `total_gold_items` but contributes nothing to the rates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use geoscore_types::record::ExtractionReport;

/// Aggregate retrieval quality over one prediction file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRateSummary {
    pub table_hit_rate: f64,
    pub column_hit_rate: f64,
    pub total_gold_items: usize,
    pub matched_items: usize,
    pub table_hit_count: usize,
    pub table_total_count: usize,
    pub column_hit_count: usize,
    pub column_total_count: usize,
}

/// Score predicted table/column extractions against gold ones, keyed by
/// record id. Names are compared trimmed, unquoted, and lowercased.
#[must_use]
pub fn score_extractions(pred: &[ExtractionReport], gold: &[ExtractionReport]) -> HitRateSummary {
    let pred_map = build_lookup(pred);
    let gold_map = build_lookup(gold);

    let mut matched = 0;
    let mut table_hits = 0;
    let mut table_total = 0;
    let mut column_hits = 0;
    let mut column_total = 0;

    for (key, gold_tables) in &gold_map {
        let Some(pred_tables) = pred_map.get(key) else {
            continue;
        };
        matched += 1;

        table_total += gold_tables.len();
        table_hits += gold_tables
            .keys()
            .filter(|t| pred_tables.contains_key(*t))
            .count();

        for (table, gold_cols) in gold_tables {
            column_total += gold_cols.len();
            if let Some(pred_cols) = pred_tables.get(table) {
                column_hits += gold_cols.iter().filter(|c| pred_cols.contains(*c)).count();
            }
        }
    }

    HitRateSummary {
        table_hit_rate: ratio(table_hits, table_total),
        column_hit_rate: ratio(column_hits, column_total),
        total_gold_items: gold_map.len(),
        matched_items: matched,
        table_hit_count: table_hits,
        table_total_count: table_total,
        column_hit_count: column_hits,
        column_total_count: column_total,
    }
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    let r = hits as f64 / total as f64;
    (r * 10_000.0).round() / 10_000.0
}

fn norm(name: &str) -> String {
    name.trim().trim_matches('"').to_ascii_lowercase()
}

type TableColumnMap = BTreeMap<String, Vec<String>>;

fn build_lookup(reports: &[ExtractionReport]) -> BTreeMap<String, TableColumnMap> {
    let mut out = BTreeMap::new();
    for report in reports {
        if report.id.is_null() {
            continue;
        }
        let key = report.id.to_string();
        let mut tables: TableColumnMap = BTreeMap::new();
        for r in &report.tables {
            let table = norm(&r.table);
            if table.is_empty() {
                continue;
            }
            let cols = tables.entry(table).or_default();
            for c in &r.columns {
                let col = norm(c);
                if !cols.contains(&col) {
                    cols.push(col);
                }
            }
        }
        out.insert(key, tables);
    }
    out
}
