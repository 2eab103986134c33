//! The result equivalence engine.
//!
//! Evaluation advances through a fixed sequence of phases with early-exit
//! terminals; every failure mode maps to a field of the output record, never
//! to a panic or an aborted batch:
//!
//! ```text
//! INIT → GOLD_EXECUTED → PRED_EXECUTED → ROW_COUNT_CHECKED
//!      → COLUMNS_MATCHED → DONE
//! ```
//!
//! A failing gold query yields verdict `unknown` (a broken reference is not
//! the prediction's fault); a failing predicted query is captured verbatim
//! for downstream error classification; structural mismatches are verdict
//! `incorrect` with a descriptive message.

use std::time::{Duration, Instant};

use geoscore_backend::SqlBackend;
use geoscore_geom::GeometryOracle;
use geoscore_types::record::{
    ColumnComparison, ColumnKind, EvalRecord, EvalReport, StrategyPassRate, Verdict,
};
use geoscore_types::{CellValue, TabularResult};

use crate::matcher::{build_compatibility, compare_column_pair, maximum_matching};
use crate::normalize::normalize;

/// Knobs for one evaluation.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Per-statement timeout applied to both gold and predicted SQL.
    pub timeout: Duration,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

/// Evaluate one benchmark record against the backend.
///
/// Routes to the gold-SQL path when `gold_sql` is present, otherwise to the
/// expected-result path; records with neither are infrastructure errors.
pub fn evaluate_record<B>(backend: &mut B, record: &EvalRecord, opts: &EvalOptions) -> EvalReport
where
    B: SqlBackend + GeometryOracle,
{
    let Some(pred_sql) = record.pred_sql.as_deref().filter(|s| !s.trim().is_empty()) else {
        return EvalReport::infrastructure_error("missing pred_sql");
    };
    if let Some(gold_sql) = record.gold_sql.as_deref().filter(|s| !s.trim().is_empty()) {
        evaluate_pair(backend, pred_sql, gold_sql, opts)
    } else if let Some(expected) = record.expected_result.as_ref() {
        evaluate_expected(backend, pred_sql, expected, opts)
    } else {
        EvalReport::infrastructure_error("missing gold_sql / expected_result")
    }
}

/// Execute predicted and gold SQL and compare their result sets.
pub fn evaluate_pair<B>(backend: &mut B, pred_sql: &str, gold_sql: &str, opts: &EvalOptions) -> EvalReport
where
    B: SqlBackend + GeometryOracle,
{
    let mut report = EvalReport::default();

    // A poisoned transaction from an earlier record must not fail this one.
    backend.rollback();
    if let Err(failure) = backend.set_statement_timeout(opts.timeout) {
        report.execution_error = failure.message;
        if failure.connection_lost {
            report.result_correct = Verdict::Error;
        }
        return report;
    }

    tracing::debug!("phase: gold execution");
    let gold_result = match timed_query(backend, gold_sql) {
        Ok((result, secs)) => {
            report.gold_executable = true;
            report.gold_execution_time = secs;
            Some(result)
        }
        Err(failure) => {
            report.gold_error = failure.message;
            None
        }
    };

    tracing::debug!("phase: predicted execution");
    let pred_result = match timed_query(backend, pred_sql) {
        Ok((result, secs)) => {
            report.executable = true;
            report.execution_time = secs;
            result
        }
        Err(failure) => {
            report.pred_error = failure.message;
            return report;
        }
    };

    // Gold failure is never blamed on the prediction: verdict stays unknown.
    let Some(gold_result) = gold_result else {
        return report;
    };

    if gold_result.is_empty() && pred_result.is_empty() {
        return report;
    }

    tracing::debug!("phase: row count check");
    let (gold_n, pred_n) = match (
        normalize(&gold_result, Some(gold_sql)),
        normalize(&pred_result, Some(pred_sql)),
    ) {
        (Ok(g), Ok(p)) => (g, p),
        (Err(e), _) | (_, Err(e)) => {
            report.execution_error = e.to_string();
            return report;
        }
    };

    if gold_n.n_rows() != pred_n.n_rows() {
        report.execution_error = format!(
            "Row count mismatch: pred {} rows vs gold {} rows",
            pred_n.n_rows(),
            gold_n.n_rows()
        );
        report.result_correct = Verdict::Incorrect;
        return report;
    }

    tracing::debug!("phase: column matching");
    let matrix = build_compatibility(backend, &pred_n, &gold_n);
    let matched = maximum_matching(&matrix.adjacency, gold_n.n_cols());
    let unmatched: Vec<&str> = matched
        .iter()
        .enumerate()
        .filter(|(_, g)| g.is_none())
        .map(|(p, _)| pred_n.columns()[p].as_str())
        .collect();
    if !unmatched.is_empty() {
        report.execution_error = format!(
            "Column match failed: no equal gold counterpart for predicted columns {unmatched:?}"
        );
        report.result_correct = Verdict::Incorrect;
        return report;
    }

    tracing::debug!("phase: verdict assembly");
    let mut counts = PassCounts::default();
    for (p_idx, g_idx) in matched.iter().enumerate() {
        let g_idx = match g_idx {
            Some(g) => *g,
            None => continue,
        };
        let Some(cmp) = matrix.pairs.get(&(p_idx, g_idx)) else {
            continue;
        };
        report.result_comparison.push(counts.record(
            cmp.kind,
            cmp.stats,
            Some(pred_n.columns()[p_idx].clone()),
            Some(gold_n.columns()[g_idx].clone()),
        ));
        report.column_type.push(cmp.kind);
    }
    report.strategy_pass_rate = counts.rates();
    report.result_correct = Verdict::Correct;
    report
}

/// Compare a predicted query's output against an inline expected result.
///
/// The expected value may be a raw scalar, a row list, a dict-row list, or a
/// single dict; it is normalized to a row matrix and compared positionally,
/// geometry-ness decided by classifying the expected cells.
pub fn evaluate_expected<B>(
    backend: &mut B,
    pred_sql: &str,
    expected: &serde_json::Value,
    opts: &EvalOptions,
) -> EvalReport
where
    B: SqlBackend + GeometryOracle,
{
    let mut report = EvalReport::default();

    backend.rollback();
    if let Err(failure) = backend.set_statement_timeout(opts.timeout) {
        report.execution_error = failure.message;
        if failure.connection_lost {
            report.result_correct = Verdict::Error;
        }
        return report;
    }

    let result = match timed_query(backend, pred_sql) {
        Ok((result, secs)) => {
            report.executable = true;
            report.execution_time = secs;
            result
        }
        Err(failure) => {
            report.execution_error = failure.message;
            return report;
        }
    };

    if result.is_empty() {
        return report;
    }

    let expected_rows = expected_matrix(expected, result.columns(), result.n_rows());
    if expected_rows.len() != result.n_rows() {
        report.execution_error = format!(
            "Row count mismatch: returned {} rows, expected {} rows",
            result.n_rows(),
            expected_rows.len()
        );
        report.result_correct = Verdict::Incorrect;
        return report;
    }

    let mut counts = PassCounts::default();
    let mut all_pass = true;
    for col_idx in 0..result.n_cols() {
        let pred_vals = result.column_values(col_idx);
        let gold_vals: Vec<CellValue> = expected_rows
            .iter()
            .map(|row| row.get(col_idx).cloned().unwrap_or_else(empty_cell))
            .collect();
        let cmp = compare_column_pair(backend, &gold_vals, &pred_vals);
        all_pass &= cmp.equal;
        report.result_comparison.push(counts.record(
            cmp.kind,
            cmp.stats,
            Some(result.columns()[col_idx].clone()),
            None,
        ));
        report.column_type.push(cmp.kind);
    }
    report.strategy_pass_rate = counts.rates();
    report.result_correct = if all_pass {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    };
    report
}

fn timed_query<B: SqlBackend + ?Sized>(
    backend: &mut B,
    sql: &str,
) -> Result<(TabularResult, f64), geoscore_backend::BackendFailure> {
    let t0 = Instant::now();
    let result = backend.run_query(sql)?;
    Ok((result, round6(t0.elapsed().as_secs_f64())))
}

fn empty_cell() -> CellValue {
    CellValue::Text(String::new())
}

/// Column-level pass counters feeding the per-strategy pass ratios.
#[derive(Default)]
struct PassCounts {
    st_astext: usize,
    st_equals: usize,
    st_z: usize,
    value_match: usize,
    total: usize,
}

impl PassCounts {
    fn record(
        &mut self,
        kind: ColumnKind,
        stats: geoscore_types::record::ColumnStats,
        pred_col: Option<String>,
        gold_col: Option<String>,
    ) -> ColumnComparison {
        self.total += 1;
        let n = stats.total_rows;
        let (by_astext, by_equals, by_z, by_value) = match kind {
            ColumnKind::Geometry => (
                stats.st_astext_pass == n,
                stats.st_equals_pass == n,
                stats.st_z_pass == n,
                false,
            ),
            ColumnKind::Text => (false, false, false, stats.value_match_pass == n),
        };
        if by_astext {
            self.st_astext += 1;
        }
        if by_equals {
            self.st_equals += 1;
        }
        if by_z {
            self.st_z += 1;
        }
        if by_value {
            self.value_match += 1;
        }
        ColumnComparison {
            stats,
            column_pass_by_st_astext: by_astext,
            column_pass_by_st_equals: by_equals,
            column_pass_by_st_z: by_z,
            column_pass_by_value_match: by_value,
            column_type: kind,
            pred_col,
            gold_col,
        }
    }

    fn rates(&self) -> StrategyPassRate {
        let total = self.total.max(1) as f64;
        StrategyPassRate {
            st_astext: round4(self.st_astext as f64 / total),
            st_equals: round4(self.st_equals as f64 / total),
            st_z: round4(self.st_z as f64 / total),
            value_match: round4(self.value_match as f64 / total),
        }
    }
}

/// Normalize the benchmark's free-form `expected_result` to a row matrix.
fn expected_matrix(
    expected: &serde_json::Value,
    columns: &[String],
    n_rows: usize,
) -> Vec<Vec<CellValue>> {
    use serde_json::Value;
    match expected {
        Value::String(s) => vec![vec![CellValue::Text(s.trim().to_owned())]],
        Value::Array(items) if items.iter().all(Value::is_array) => items
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(json_to_cell).collect())
                    .unwrap_or_default()
            })
            .collect(),
        Value::Array(items) if items.iter().all(Value::is_object) => items
            .iter()
            .map(|row| dict_row(row, columns))
            .collect(),
        Value::Object(_) => vec![dict_row(expected, columns)],
        _ => (0..n_rows)
            .map(|_| columns.iter().map(|_| empty_cell()).collect())
            .collect(),
    }
}

fn dict_row(row: &serde_json::Value, columns: &[String]) -> Vec<CellValue> {
    columns
        .iter()
        .map(|c| row.get(c).map_or_else(empty_cell, json_to_cell))
        .collect()
}

fn json_to_cell(v: &serde_json::Value) -> CellValue {
    use serde_json::Value;
    match v {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Text(b.to_string()),
        Value::Number(n) => n.as_i64().map_or_else(
            || CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            CellValue::Integer,
        ),
        Value::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}
