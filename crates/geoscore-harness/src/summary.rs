//! Aggregate statistics over an evaluated output stream.

use serde::{Deserialize, Serialize};

/// Whole-batch execution summary, one per evaluated output file.
///
/// Geometry columns pass through `st_astext` or the `st_equals` + `st_z`
/// combination; text columns through `value_match`. The `equals+z` ratio
/// also credits columns that already passed `st_astext`, so it reads as
/// "geometry columns provably equivalent by any spatial strategy".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_sql: usize,
    pub executable_sql_count: usize,
    pub correct_sql_count: usize,
    pub total_columns: usize,
    pub geometry_columns: usize,
    pub text_columns: usize,
    pub st_astext_column_pass: usize,
    #[serde(rename = "st_equals+z_column_pass")]
    pub st_equals_z_column_pass: usize,
    pub value_match_column_pass: usize,
    pub executable_sql_ratio: f64,
    pub correct_sql_ratio: f64,
    pub geometry_st_astext_pass_ratio: f64,
    #[serde(rename = "geometry_st_equals+z_pass_ratio")]
    pub geometry_st_equals_z_pass_ratio: f64,
    pub text_value_match_pass_ratio: f64,
}

/// Summarize a stream of evaluated output records.
#[must_use]
pub fn summarize(records: &[serde_json::Value]) -> ExecutionSummary {
    let mut s = ExecutionSummary {
        total_sql: records.len(),
        ..ExecutionSummary::default()
    };

    for record in records {
        if record.get("executable").and_then(serde_json::Value::as_bool) == Some(true) {
            s.executable_sql_count += 1;
        }
        if record.get("result_correct").and_then(serde_json::Value::as_str) == Some("correct") {
            s.correct_sql_count += 1;
        }

        let types = record
            .get("column_type")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let comparisons = record
            .get("result_comparison")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for (kind, comparison) in types.iter().zip(comparisons) {
            s.total_columns += 1;
            match kind.as_str() {
                Some("geometry") => {
                    s.geometry_columns += 1;
                    if flag(comparison, "column_pass_by_st_astext") {
                        s.st_astext_column_pass += 1;
                    }
                    if flag(comparison, "column_pass_by_st_equals")
                        && flag(comparison, "column_pass_by_st_z")
                    {
                        s.st_equals_z_column_pass += 1;
                    }
                }
                Some("text") => {
                    s.text_columns += 1;
                    if flag(comparison, "column_pass_by_value_match") {
                        s.value_match_column_pass += 1;
                    }
                }
                _ => {}
            }
        }
    }

    s.executable_sql_ratio = ratio(s.executable_sql_count, s.total_sql);
    s.correct_sql_ratio = ratio(s.correct_sql_count, s.total_sql);
    s.geometry_st_astext_pass_ratio = ratio(s.st_astext_column_pass, s.geometry_columns);
    s.geometry_st_equals_z_pass_ratio = ratio(
        s.st_equals_z_column_pass + s.st_astext_column_pass,
        s.geometry_columns,
    );
    s.text_value_match_pass_ratio = ratio(s.value_match_column_pass, s.text_columns);
    s
}

fn flag(comparison: &serde_json::Value, field: &str) -> bool {
    comparison.get(field).and_then(serde_json::Value::as_bool) == Some(true)
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let r = count as f64 / total as f64;
    (r * 10_000.0).round() / 10_000.0
}
