//! Input and output record types for evaluation and reference extraction.
//!
//! Wire field names mirror the benchmark's JSONL schema so evaluated files
//! remain interoperable with existing tooling.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall verdict for one evaluated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every predicted column found an equivalent gold counterpart.
    Correct,
    /// Structural or value mismatch attributable to the prediction.
    Incorrect,
    /// Comparison never reached a conclusion (gold failed, empty results).
    Unknown,
    /// Infrastructure failure prevented evaluation.
    Error,
}

impl Verdict {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

/// One of the four independent equivalence strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    StAstext,
    StEquals,
    StZ,
    ValueMatch,
}

/// How a matched column pair was compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Geometry,
    Text,
}

/// Per-row pass counters for one (predicted, gold) column pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(rename = "ST_AsText_pass")]
    pub st_astext_pass: usize,
    #[serde(rename = "ST_Equals_pass")]
    pub st_equals_pass: usize,
    #[serde(rename = "ST_Z_pass")]
    pub st_z_pass: usize,
    pub value_match_pass: usize,
    pub total_rows: usize,
}

/// Per-column comparison record emitted for every matched pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnComparison {
    #[serde(flatten)]
    pub stats: ColumnStats,
    pub column_pass_by_st_astext: bool,
    pub column_pass_by_st_equals: bool,
    pub column_pass_by_st_z: bool,
    pub column_pass_by_value_match: bool,
    pub column_type: ColumnKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pred_col: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_col: Option<String>,
}

/// Fraction of matched columns passing each strategy, in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyPassRate {
    pub st_astext: f64,
    pub st_equals: f64,
    pub st_z: f64,
    pub value_match: f64,
}

/// One benchmark record to evaluate.
///
/// `id` and `round` stay as raw JSON values: benchmark files mix integer and
/// string identifiers. Unknown fields are preserved so they pass through to
/// the output record untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub pred_sql: Option<String>,
    #[serde(default)]
    pub gold_sql: Option<String>,
    #[serde(default)]
    pub db_id: Option<String>,
    #[serde(default)]
    pub expected_result: Option<Value>,
    #[serde(default)]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub round: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Evaluation outcome merged into the input record on output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub executable: bool,
    pub execution_error: String,
    pub execution_time: f64,
    pub result_correct: Verdict,
    pub result_comparison: Vec<ColumnComparison>,
    pub column_type: Vec<ColumnKind>,
    pub strategy_pass_rate: StrategyPassRate,
    pub gold_executable: bool,
    pub gold_execution_time: f64,
    pub gold_error: String,
    pub pred_error: String,
}

impl Default for EvalReport {
    fn default() -> Self {
        Self {
            executable: false,
            execution_error: String::new(),
            execution_time: 0.0,
            result_correct: Verdict::Unknown,
            result_comparison: Vec::new(),
            column_type: Vec::new(),
            strategy_pass_rate: StrategyPassRate::default(),
            gold_executable: false,
            gold_execution_time: 0.0,
            gold_error: String::new(),
            pred_error: String::new(),
        }
    }
}

impl EvalReport {
    /// A terminal report for records that could not be evaluated at all.
    #[must_use]
    pub fn infrastructure_error(message: impl Into<String>) -> Self {
        Self {
            execution_error: message.into(),
            result_correct: Verdict::Error,
            ..Self::default()
        }
    }
}

/// A table with the columns a SQL statement references from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReference {
    pub table: String,
    pub columns: Vec<String>,
}

/// One record of the reference-extraction path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub db_id: Option<String>,
    /// The SQL whose table/column references are recovered.
    #[serde(alias = "query", alias = "pred_sql")]
    pub sql_text: String,
    /// The `#table( … )` schema description block.
    #[serde(alias = "schema")]
    pub schema_text: String,
}

/// Extraction output: ordered table references, FROM/JOIN tables first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,
    pub tables: Vec<TableReference>,
}
