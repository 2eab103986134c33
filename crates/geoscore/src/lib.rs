//! Execution-grounded scoring of generated spatial SQL.
//!
//! GeoScore executes a predicted SQL statement and a reference (gold)
//! statement against the same live PostGIS database and decides whether
//! their result sets are semantically equivalent: rows may arrive in any
//! order, columns may be renamed or reordered, and geometry values may be
//! spelled in any encoding, as long as some column assignment matches
//! value-for-value under the geometry-aware comparison strategies.
//!
//! The crates compose as follows:
//!
//! - [`geoscore_types`] — result tables, cell values, wire records;
//! - [`geoscore_error`] — the shared error type;
//! - [`geoscore_geom`] — geometry classification and the oracle seam;
//! - [`geoscore_backend`] — SQL execution over `postgres`, implementing the
//!   oracle;
//! - [`geoscore_compare`] — normalization, column matching, and the verdict
//!   engine;
//! - [`geoscore_refs`] — schema-grounded table/column reference extraction;
//! - [`geoscore_harness`] — batch pipelines with workers and resumability.
//!
//! # Example
//!
//! ```no_run
//! use geoscore::{evaluate_record, EvalOptions, PgBackend, PgConfig};
//! use geoscore::record::EvalRecord;
//!
//! # fn main() -> geoscore::Result<()> {
//! let record: EvalRecord = serde_json::from_str(
//!     r#"{"id": 1, "pred_sql": "SELECT geom FROM parcels",
//!         "gold_sql": "SELECT shape FROM parcels", "db_id": "nyc"}"#,
//! )?;
//! let mut backend = PgBackend::connect(&PgConfig::default().with_dbname("nyc"))?;
//! let report = evaluate_record(&mut backend, &record, &EvalOptions::default());
//! println!("{}", report.result_correct.as_str());
//! # Ok(())
//! # }
//! ```

pub use geoscore_backend::{BackendFailure, PgBackend, PgConfig, SqlBackend};
pub use geoscore_compare::{evaluate_record, normalize, EvalOptions};
pub use geoscore_error::{GeoscoreError, Result};
pub use geoscore_geom::{GeometryEncoding, GeometryOracle};
pub use geoscore_harness::{
    extract_last_sql, run_eval_batch, run_extract_batch, summarize, ExecutionSummary, JsonlSink,
    RunnerConfig,
};
pub use geoscore_refs::{extract_references, score_extractions, SchemaCatalog};
pub use geoscore_types::record;
pub use geoscore_types::{CellValue, TabularResult};
