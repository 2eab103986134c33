//! Scriptable backend for tests.
//!
//! Stands in for a live PostGIS connection: statements answer from a script,
//! and canonicalization follows the engine's SRID-4326 defaulting for
//! well-formed WKT so comparison logic can be exercised hermetically. Not a
//! geometry engine — anything beyond the scripted surface fails the same way
//! a malformed value would.

use std::collections::HashMap;
use std::time::Duration;

use geoscore_backend::{BackendFailure, SqlBackend};
use geoscore_geom::{is_wkt_literal, GeometryEncoding, GeometryOracle};
use geoscore_types::TabularResult;

#[derive(Default)]
pub struct ScriptedBackend {
    statements: HashMap<String, Result<TabularResult, String>>,
    canonical_overrides: HashMap<String, String>,
    z_overrides: HashMap<String, Vec<Option<f64>>>,
    equal_pairs: Vec<(String, String)>,
    pub rollbacks: usize,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a statement to return `result`.
    #[must_use]
    pub fn on_query(mut self, sql: &str, result: TabularResult) -> Self {
        self.statements.insert(sql.trim().to_owned(), Ok(result));
        self
    }

    /// Script a statement to fail with `message`.
    #[must_use]
    pub fn on_query_error(mut self, sql: &str, message: &str) -> Self {
        self.statements
            .insert(sql.trim().to_owned(), Err(message.to_owned()));
        self
    }

    /// Override canonicalization of one raw value (e.g. hex WKB).
    #[must_use]
    pub fn canonicalizes(mut self, raw: &str, ewkt: &str) -> Self {
        self.canonical_overrides
            .insert(raw.to_owned(), ewkt.to_owned());
        self
    }

    /// Override the Z sequence of one canonical EWKT.
    #[must_use]
    pub fn with_z(mut self, ewkt: &str, z: Vec<Option<f64>>) -> Self {
        self.z_overrides.insert(ewkt.to_owned(), z);
        self
    }

    /// Declare two canonical EWKTs spatially equal despite differing text.
    #[must_use]
    pub fn spatially_equates(mut self, a: &str, b: &str) -> Self {
        self.equal_pairs.push((a.to_owned(), b.to_owned()));
        self
    }
}

impl SqlBackend for ScriptedBackend {
    fn run_query(&mut self, sql: &str) -> Result<TabularResult, BackendFailure> {
        match self.statements.get(sql.trim()) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(BackendFailure::statement(message.clone())),
            None => Err(BackendFailure::statement(format!(
                "no scripted answer for statement: {sql}"
            ))),
        }
    }

    fn set_statement_timeout(&mut self, _timeout: Duration) -> Result<(), BackendFailure> {
        Ok(())
    }

    fn rollback(&mut self) {
        self.rollbacks += 1;
    }
}

impl GeometryOracle for ScriptedBackend {
    fn canonicalize(
        &mut self,
        raw: &str,
        _encoding: GeometryEncoding,
    ) -> Result<Option<String>, String> {
        if let Some(ewkt) = self.canonical_overrides.get(raw) {
            return Ok(Some(ewkt.clone()));
        }
        let trimmed = raw.trim();
        if is_wkt_literal(trimmed) {
            if trimmed.to_uppercase().starts_with("SRID=") {
                Ok(Some(trimmed.to_owned()))
            } else {
                Ok(Some(format!("SRID=4326;{trimmed}")))
            }
        } else {
            Err(format!("parse error at or near \"{trimmed}\""))
        }
    }

    fn spatially_equal(&mut self, a_ewkt: &str, b_ewkt: &str) -> Result<bool, String> {
        Ok(a_ewkt.eq_ignore_ascii_case(b_ewkt)
            || self
                .equal_pairs
                .iter()
                .any(|(x, y)| (x == a_ewkt && y == b_ewkt) || (x == b_ewkt && y == a_ewkt)))
    }

    fn z_sequence(&mut self, ewkt: &str) -> Result<Vec<Option<f64>>, String> {
        Ok(self
            .z_overrides
            .get(ewkt)
            .cloned()
            .unwrap_or_else(|| vec![None]))
    }
}
