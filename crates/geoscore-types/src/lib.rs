//! Core data model for GeoScore.
//!
//! Everything here is created fresh per evaluated record, immutable after
//! construction, and discarded once the verdict or extraction is emitted.

pub mod record;
pub mod table;
pub mod value;

pub use record::{
    ColumnComparison, ColumnKind, ColumnStats, EvalRecord, EvalReport, ExtractionRecord,
    ExtractionReport, Strategy, StrategyPassRate, TableReference, Verdict,
};
pub use table::TabularResult;
pub use value::CellValue;
