//! Result normalization, column matching, and the equivalence engine.
//!
//! Data flow: the engine executes gold and predicted SQL through a
//! [`geoscore_backend::SqlBackend`], normalizes both result sets, builds a
//! column-compatibility graph through the geometry/text comparators, and
//! renders the verdict from a maximum bipartite matching.

pub mod engine;
pub mod matcher;
pub mod normalize;
pub mod testkit;

pub use engine::{evaluate_record, EvalOptions};
pub use matcher::{build_compatibility, maximum_matching, ColumnCompatibility};
pub use normalize::{normalize, parse_order_by, OrderKey};
