//! Batch evaluation harness.
//!
//! Ties the comparison engine and reference extractor to JSONL pipelines:
//! [`clean`] recovers SQL from raw model output, [`resume`] provides
//! content-keyed resumable output, [`runner`] fans records out over worker
//! threads with per-database connection caching, and [`summary`] aggregates
//! an evaluated stream into one report.

pub mod clean;
pub mod resume;
pub mod runner;
pub mod summary;

pub use clean::extract_last_sql;
pub use resume::{load_completed_keys, record_key, JsonlSink};
pub use runner::{run_clean_batch, run_eval_batch, run_extract_batch, BatchStats, RunnerConfig};
pub use summary::{summarize, ExecutionSummary};
