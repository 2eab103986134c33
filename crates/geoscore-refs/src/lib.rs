//! Schema-grounded SQL reference extraction.
//!
//! Three lexical passes cooperate to recover which tables and columns a SQL
//! statement touches, grounded in a textual schema description:
//!
//! - [`catalog`] parses `#table( … )` schema blocks into a
//!   [`SchemaCatalog`];
//! - [`alias`] scans FROM/JOIN clauses into an [`AliasMap`];
//! - [`extract`] combines both with a schema-management function whitelist
//!   to produce ordered [`TableReference`] lists.
//!
//! [`scoring`] compares predicted extractions against gold ones and reports
//! micro-averaged table/column hit rates.
//!
//! [`TableReference`]: geoscore_types::record::TableReference

pub mod alias;
pub mod catalog;
pub mod extract;
mod scan;
pub mod scoring;

pub use alias::{parse_tables_with_aliases, AliasMap};
pub use catalog::SchemaCatalog;
pub use extract::extract_references;
pub use scoring::{score_extractions, HitRateSummary};
