//! SQL execution seam for GeoScore.
//!
//! [`SqlBackend`] abstracts the statement-executing side of a database
//! connection; the comparison engine is written against it and never touches
//! a driver directly. The production implementation is [`pg::PgBackend`],
//! which also serves as the [`geoscore_geom::GeometryOracle`].

use std::time::Duration;

use geoscore_types::TabularResult;

pub mod pg;

pub use pg::{PgBackend, PgConfig};

/// Why a backend operation failed, with enough signal for the caller to
/// distinguish a dead connection from a bad statement.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    /// The driver's error message, retained verbatim for downstream
    /// error classification.
    pub message: String,
    /// The connection itself is unusable and must be recreated.
    pub connection_lost: bool,
}

impl BackendFailure {
    #[must_use]
    pub fn statement(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connection_lost: false,
        }
    }
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A SQL-executing connection with a configurable statement timeout.
///
/// Failure is data here: a failed execution is returned, recorded, and never
/// retried, since a predicted query's failure is itself a measurement.
pub trait SqlBackend {
    /// Execute one statement and capture its full result set.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFailure`] with the driver message on any execution
    /// failure, including statement timeout.
    fn run_query(&mut self, sql: &str) -> Result<TabularResult, BackendFailure>;

    /// Bound every subsequent statement on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFailure`] if the setting cannot be applied.
    fn set_statement_timeout(&mut self, timeout: Duration) -> Result<(), BackendFailure>;

    /// Roll back any open transaction state so a poisoned transaction from
    /// one statement cannot fail the next. Best-effort; never errors.
    fn rollback(&mut self);
}
