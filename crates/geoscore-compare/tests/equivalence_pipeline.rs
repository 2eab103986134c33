//! End-to-end equivalence runs over the scripted backend.
//!
//! These tests drive [`geoscore_compare::evaluate_record`] through the full
//! pipeline (execution, normalization, column matching, verdict), while the
//! inline unit tests in each submodule cover the individual stages.

use std::time::Duration;

use geoscore_compare::testkit::ScriptedBackend;
use geoscore_compare::{evaluate_record, EvalOptions};
use geoscore_types::record::{ColumnKind, EvalRecord, Verdict};
use geoscore_types::{CellValue, TabularResult};

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_owned())
}

fn table(cols: &[&str], rows: &[&[&str]]) -> TabularResult {
    TabularResult::new(
        cols.iter().map(|c| (*c).to_owned()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|v| text(v)).collect())
            .collect(),
    )
    .unwrap()
}

fn record(pred_sql: &str, gold_sql: &str) -> EvalRecord {
    serde_json::from_value(serde_json::json!({
        "id": 1,
        "db_id": "nyc",
        "pred_sql": pred_sql,
        "gold_sql": gold_sql,
    }))
    .unwrap()
}

// ===========================================================================
// 1. CORRECT VERDICTS
// ===========================================================================

#[test]
fn renamed_reordered_columns_are_still_correct() {
    let gold_sql = "SELECT name, geom FROM parks";
    let pred_sql = "SELECT shape, park_name FROM parks";
    let mut backend = ScriptedBackend::new()
        .on_query(
            gold_sql,
            table(&["name", "geom"], &[&["Central", "POINT(1 1)"]]),
        )
        .on_query(
            pred_sql,
            table(&["shape", "park_name"], &[&["POINT(1 1)", "central"]]),
        );

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Correct);
    assert!(report.executable);
    assert!(report.gold_executable);
    assert_eq!(report.result_comparison.len(), 2);
    let kinds: Vec<ColumnKind> = report.column_type.clone();
    assert!(kinds.contains(&ColumnKind::Geometry));
    assert!(kinds.contains(&ColumnKind::Text));
    // One rollback isolates this record from earlier transaction state.
    assert_eq!(backend.rollbacks, 1);
}

#[test]
fn srid_prefix_spelling_does_not_break_equivalence() {
    let gold_sql = "SELECT geom FROM a";
    let pred_sql = "SELECT geom FROM b";
    let mut backend = ScriptedBackend::new()
        .on_query(gold_sql, table(&["geom"], &[&["SRID=4326;POINT(2 48)"]]))
        .on_query(pred_sql, table(&["geom"], &[&["POINT(2 48)"]]));

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Correct);
    let cmp = &report.result_comparison[0];
    assert!(cmp.column_pass_by_st_astext);
    assert_eq!(cmp.column_type, ColumnKind::Geometry);
    assert_eq!(report.strategy_pass_rate.st_astext, 1.0);
}

#[test]
fn row_order_differences_are_normalized_away() {
    let gold_sql = "SELECT name FROM cities";
    let pred_sql = "SELECT name FROM cities WHERE 1=1";
    let mut backend = ScriptedBackend::new()
        .on_query(gold_sql, table(&["name"], &[&["Paris"], &["Lyon"]]))
        .on_query(pred_sql, table(&["name"], &[&["lyon"], &["paris"]]));

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Correct);
    assert_eq!(report.strategy_pass_rate.value_match, 1.0);
}

// ===========================================================================
// 2. INCORRECT VERDICTS
// ===========================================================================

#[test]
fn row_count_mismatch_names_both_counts() {
    let gold_sql = "SELECT id FROM t";
    let pred_sql = "SELECT id FROM t LIMIT 1";
    let mut backend = ScriptedBackend::new()
        .on_query(gold_sql, table(&["id"], &[&["1"], &["2"]]))
        .on_query(pred_sql, table(&["id"], &[&["1"]]));

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Incorrect);
    assert_eq!(
        report.execution_error,
        "Row count mismatch: pred 1 rows vs gold 2 rows"
    );
    assert!(report.result_comparison.is_empty());
}

#[test]
fn unmatched_predicted_column_is_reported_by_name() {
    let gold_sql = "SELECT name FROM t";
    let pred_sql = "SELECT name, bogus FROM t";
    let mut backend = ScriptedBackend::new()
        .on_query(gold_sql, table(&["name"], &[&["x"]]))
        .on_query(pred_sql, table(&["name", "bogus"], &[&["x", "???"]]));

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Incorrect);
    assert!(report.execution_error.contains("bogus"), "{}", report.execution_error);
}

// ===========================================================================
// 3. FAILURE ISOLATION
// ===========================================================================

#[test]
fn gold_failure_yields_unknown_but_still_measures_pred() {
    let gold_sql = "SELECT broken FROM nowhere";
    let pred_sql = "SELECT 1";
    let mut backend = ScriptedBackend::new()
        .on_query_error(gold_sql, "relation \"nowhere\" does not exist")
        .on_query(pred_sql, table(&["?column?"], &[&["1"]]));

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Unknown);
    assert!(!report.gold_executable);
    assert!(report.gold_error.contains("nowhere"));
    // The predicted side still executed; its measurement is preserved.
    assert!(report.executable);
    assert!(report.pred_error.is_empty());
}

#[test]
fn pred_failure_message_is_preserved_verbatim() {
    let gold_sql = "SELECT 1";
    let pred_sql = "SELEKT 1";
    let mut backend = ScriptedBackend::new()
        .on_query(gold_sql, table(&["?column?"], &[&["1"]]))
        .on_query_error(pred_sql, "syntax error at or near \"SELEKT\"");

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Unknown);
    assert!(!report.executable);
    assert_eq!(report.pred_error, "syntax error at or near \"SELEKT\"");
}

#[test]
fn both_empty_results_stay_unknown() {
    let gold_sql = "SELECT id FROM t WHERE false";
    let pred_sql = "SELECT id FROM t WHERE 1=0";
    let mut backend = ScriptedBackend::new()
        .on_query(gold_sql, TabularResult::empty())
        .on_query(pred_sql, TabularResult::empty());

    let report = evaluate_record(&mut backend, &record(pred_sql, gold_sql), &EvalOptions::default());

    assert_eq!(report.result_correct, Verdict::Unknown);
    assert!(report.executable);
    assert!(report.gold_executable);
}

#[test]
fn missing_pred_sql_is_an_infrastructure_error() {
    let rec: EvalRecord =
        serde_json::from_value(serde_json::json!({ "id": 9, "gold_sql": "SELECT 1" })).unwrap();
    let mut backend = ScriptedBackend::new();
    let report = evaluate_record(
        &mut backend,
        &rec,
        &EvalOptions {
            timeout: Duration::from_secs(1),
        },
    );
    assert_eq!(report.result_correct, Verdict::Error);
    assert_eq!(report.execution_error, "missing pred_sql");
}
