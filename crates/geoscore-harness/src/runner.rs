//! Batch evaluation over worker threads.
//!
//! Records are fanned out over an mpsc channel to a fixed pool of workers.
//! Each worker owns its own per-database connection cache: records for the
//! same database identifier reuse one connection, and a connection-level
//! failure discards only that cached connection, so the next record on that
//! database reconnects fresh. Nothing is shared between workers except the
//! completed-key set (read-only) and the locked output sink.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc;

use parking_lot::Mutex;

use geoscore_backend::{PgBackend, PgConfig};
use geoscore_compare::{evaluate_record, EvalOptions};
use geoscore_error::Result;
use geoscore_refs::{extract_references, SchemaCatalog};
use geoscore_types::record::{EvalRecord, EvalReport, ExtractionRecord, ExtractionReport};

use crate::clean::extract_last_sql;
use crate::resume::{record_key, JsonlSink};

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub db: PgConfig,
    pub workers: usize,
    pub eval: EvalOptions,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            db: PgConfig::default(),
            workers: 4,
            eval: EvalOptions::default(),
        }
    }
}

/// Outcome counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub skipped: usize,
    pub evaluated: usize,
    pub errors: usize,
}

/// Evaluate a batch of records against live databases, appending one output
/// line per record. Records whose key is in `completed` are skipped.
pub fn run_eval_batch(
    records: &[serde_json::Value],
    completed: &HashSet<String>,
    config: &RunnerConfig,
    sink: &JsonlSink,
) -> Result<BatchStats> {
    let mut stats = BatchStats {
        total: records.len(),
        ..BatchStats::default()
    };

    let (sender, receiver) = mpsc::channel::<serde_json::Value>();
    for record in records {
        let key = record_key(record);
        if completed.contains(&key) {
            stats.skipped += 1;
            continue;
        }
        let _ = sender.send(record.clone());
    }
    drop(sender);

    let receiver = Mutex::new(receiver);
    let tally = Mutex::new((0usize, 0usize));
    let first_failure: Mutex<Option<geoscore_error::GeoscoreError>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..config.workers.max(1) {
            scope.spawn(|| {
                let mut connections: HashMap<String, PgBackend> = HashMap::new();
                loop {
                    let job = { receiver.lock().recv() };
                    let Ok(record) = job else {
                        break;
                    };
                    let (output, is_error) = evaluate_one(&record, config, &mut connections);
                    {
                        let mut t = tally.lock();
                        t.0 += 1;
                        t.1 += usize::from(is_error);
                    }
                    if let Err(err) = sink.write(&output) {
                        let mut slot = first_failure.lock();
                        if slot.is_none() {
                            *slot = Some(err);
                        }
                        break;
                    }
                }
            });
        }
    });

    if let Some(err) = first_failure.into_inner() {
        return Err(err);
    }
    let (evaluated, errors) = tally.into_inner();
    stats.evaluated = evaluated;
    stats.errors = errors;
    sink.flush()?;
    Ok(stats)
}

/// Evaluate one record with the worker's connection cache, producing the
/// merged output line. Never fails: every failure mode lands in the record.
fn evaluate_one(
    record: &serde_json::Value,
    config: &RunnerConfig,
    connections: &mut HashMap<String, PgBackend>,
) -> (serde_json::Value, bool) {
    let key = record_key(record);
    let report = report_for(record, config, connections);
    let is_error = !report.execution_error.is_empty()
        || !report.pred_error.is_empty()
        || !report.gold_error.is_empty();
    (merged_record(record, &report, &key), is_error)
}

fn report_for(
    record: &serde_json::Value,
    config: &RunnerConfig,
    connections: &mut HashMap<String, PgBackend>,
) -> EvalReport {
    let parsed: EvalRecord = match serde_json::from_value(record.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return EvalReport::infrastructure_error(format!("malformed record: {err}")),
    };
    let Some(db_id) = parsed
        .db_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return EvalReport::infrastructure_error("missing db_id");
    };

    let backend = match connections.entry(db_id.to_owned()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(slot) => match PgBackend::connect(&config.db.with_dbname(db_id)) {
            Ok(backend) => slot.insert(backend),
            Err(err) => {
                tracing::warn!(db_id, %err, "connect failed");
                return EvalReport::infrastructure_error(format!("connection error: {err}"));
            }
        },
    };

    let report = evaluate_record(backend, &parsed, &config.eval);
    if backend.connection_lost() {
        tracing::warn!(db_id, "connection lost, discarding cached connection");
        connections.remove(db_id);
    }
    report
}

/// Merge the evaluation outcome into the input record, preserving every
/// input field, and stamp the resume key.
fn merged_record(input: &serde_json::Value, report: &EvalReport, key: &str) -> serde_json::Value {
    let mut out = match input {
        serde_json::Value::Object(map) => map.clone(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("input".to_owned(), other.clone());
            map
        }
    };
    if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(report) {
        out.extend(fields);
    }
    out.insert("unique_key".to_owned(), serde_json::Value::String(key.to_owned()));
    serde_json::Value::Object(out)
}

/// Extract table/column references for a batch of (SQL, schema) records.
/// Purely lexical, so it runs single-threaded.
pub fn run_extract_batch(records: &[serde_json::Value], sink: &JsonlSink) -> Result<BatchStats> {
    let mut stats = BatchStats {
        total: records.len(),
        ..BatchStats::default()
    };

    for record in records {
        let output = match serde_json::from_value::<ExtractionRecord>(record.clone()) {
            Ok(parsed) => {
                let catalog = SchemaCatalog::parse(&parsed.schema_text);
                let report = ExtractionReport {
                    id: parsed.id,
                    db_id: parsed.db_id,
                    tables: extract_references(&parsed.sql_text, &catalog),
                };
                stats.evaluated += 1;
                serde_json::to_value(report)?
            }
            Err(err) => {
                stats.errors += 1;
                serde_json::json!({
                    "id": record.get("id").cloned().unwrap_or(serde_json::Value::Null),
                    "error": format!("malformed record: {err}"),
                })
            }
        };
        sink.write(&output)?;
    }

    sink.flush()?;
    Ok(stats)
}

/// Rewrite each record's `pred_sql` to the recovered SQL statement.
pub fn run_clean_batch(records: &[serde_json::Value], sink: &JsonlSink) -> Result<BatchStats> {
    let mut stats = BatchStats {
        total: records.len(),
        ..BatchStats::default()
    };

    for record in records {
        let mut out = record.clone();
        if let Some(map) = out.as_object_mut() {
            let raw = map
                .get("pred_sql")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let cleaned = extract_last_sql(raw);
            map.insert("pred_sql".to_owned(), serde_json::Value::String(cleaned));
            stats.evaluated += 1;
        } else {
            stats.errors += 1;
        }
        sink.write(&out)?;
    }

    sink.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_record_keeps_input_fields() {
        let input = serde_json::json!({"id": 3, "question": "where?", "db_id": "nyc"});
        let report = EvalReport::infrastructure_error("missing pred_sql");
        let out = merged_record(&input, &report, "k123");
        assert_eq!(out["id"], 3);
        assert_eq!(out["question"], "where?");
        assert_eq!(out["result_correct"], "error");
        assert_eq!(out["execution_error"], "missing pred_sql");
        assert_eq!(out["unique_key"], "k123");
    }

    #[test]
    fn test_extract_batch_writes_reports_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picked.jsonl");
        let sink = JsonlSink::append(&path, 1).unwrap();

        let records = vec![
            serde_json::json!({
                "id": 1,
                "query": "SELECT t1.id FROM t1",
                "schema": "#t1(id, geom)",
            }),
            serde_json::json!({"id": 2}),
        ];
        let stats = run_extract_batch(&records, &sink).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.evaluated, 1);
        assert_eq!(stats.errors, 1);

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["tables"][0]["table"], "t1");
        assert_eq!(lines[0]["tables"][0]["columns"][0], "id");
        assert!(lines[1]["error"].as_str().unwrap().contains("malformed"));
    }

    #[test]
    fn test_clean_batch_rewrites_pred_sql() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.jsonl");
        let sink = JsonlSink::append(&path, 1).unwrap();

        let records = vec![serde_json::json!({
            "id": 1,
            "pred_sql": "Sure!\n```sql\nSELECT 1;\n```",
        })];
        let stats = run_clean_batch(&records, &sink).unwrap();
        assert_eq!(stats.evaluated, 1);

        let body = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
        assert_eq!(line["pred_sql"], "SELECT 1;");
        assert_eq!(line["id"], 1);
    }
}
