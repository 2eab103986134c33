//! PostgreSQL/PostGIS backend.
//!
//! Result sets are captured through the simple-query protocol, which returns
//! every column as text — exactly the representation the normalizer and the
//! value-match strategy work on, and the form in which geometry columns
//! arrive as hex-encoded WKB. Geometry canonicalization runs as parameterized
//! SQL expressions over the same connection; no native geometry library is
//! involved anywhere.

use std::time::Duration;

use postgres::{Client, NoTls, SimpleQueryMessage};

use geoscore_error::{GeoscoreError, Result};
use geoscore_geom::{GeometryEncoding, GeometryOracle};
use geoscore_types::{CellValue, TabularResult};

use crate::{BackendFailure, SqlBackend};

/// Connection parameters; `dbname` varies per benchmark record while the
/// rest comes from run configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: String::new(),
            dbname: "postgres".to_owned(),
        }
    }
}

impl PgConfig {
    /// The same configuration pointed at a different database.
    #[must_use]
    pub fn with_dbname(&self, dbname: &str) -> Self {
        Self {
            dbname: dbname.to_owned(),
            ..self.clone()
        }
    }
}

/// A live connection implementing both the execution seam and the geometry
/// oracle.
pub struct PgBackend {
    client: Client,
    connection_lost: bool,
}

impl PgBackend {
    /// Open a connection.
    ///
    /// # Errors
    ///
    /// Returns `GeoscoreError::Connect` when the server is unreachable or
    /// refuses the credentials.
    pub fn connect(config: &PgConfig) -> Result<Self> {
        let mut pg = postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.dbname);
        let client = pg.connect(NoTls).map_err(|e| GeoscoreError::Connect {
            database: config.dbname.clone(),
            detail: e.to_string(),
        })?;
        tracing::debug!(database = %config.dbname, "connected");
        Ok(Self {
            client,
            connection_lost: false,
        })
    }

    /// Whether a previous operation saw the connection die. A lost
    /// connection is discarded and recreated by the caller before the next
    /// record; the failed record is never retried.
    #[must_use]
    pub fn connection_lost(&self) -> bool {
        self.connection_lost
    }

    fn failure(&mut self, e: &postgres::Error) -> BackendFailure {
        let connection_lost = e.is_closed();
        if connection_lost {
            self.connection_lost = true;
        }
        BackendFailure {
            message: e.to_string(),
            connection_lost,
        }
    }

    fn oracle_failure(&mut self, e: &postgres::Error) -> String {
        if e.is_closed() {
            self.connection_lost = true;
        }
        e.to_string()
    }
}

impl SqlBackend for PgBackend {
    fn run_query(&mut self, sql: &str) -> std::result::Result<TabularResult, BackendFailure> {
        let messages = self
            .client
            .simple_query(sql.trim())
            .map_err(|e| self.failure(&e))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        for message in &messages {
            if let SimpleQueryMessage::Row(row) = message {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_owned()).collect();
                }
                let values = (0..row.len())
                    .map(|i| match row.get(i) {
                        Some(text) => CellValue::Text(text.to_owned()),
                        None => CellValue::Null,
                    })
                    .collect();
                rows.push(values);
            }
        }

        TabularResult::new(columns, rows).map_err(|e| BackendFailure::statement(e.to_string()))
    }

    fn set_statement_timeout(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<(), BackendFailure> {
        let ms = timeout.as_millis();
        self.client
            .batch_execute(&format!("SET statement_timeout = {ms};"))
            .map_err(|e| self.failure(&e))
    }

    fn rollback(&mut self) {
        // Outside a transaction this is a harmless no-op warning.
        if let Err(e) = self.client.batch_execute("ROLLBACK;") {
            if e.is_closed() {
                self.connection_lost = true;
            }
            tracing::debug!(detail = %e, "rollback before evaluation failed");
        }
    }
}

impl GeometryOracle for PgBackend {
    fn canonicalize(
        &mut self,
        raw: &str,
        encoding: GeometryEncoding,
    ) -> std::result::Result<Option<String>, String> {
        let sql = match encoding {
            GeometryEncoding::HexWkb => {
                "SELECT ST_AsEWKT(ST_SetSRID(ST_GeomFromWKB(decode($1::text, 'hex')), 4326))"
            }
            GeometryEncoding::EwktGeography => {
                "SELECT ST_AsEWKT(($1::text)::geography::geometry)"
            }
            GeometryEncoding::Wkt => {
                "SELECT ST_AsEWKT(ST_SetSRID(ST_GeomFromText($1::text), 4326))"
            }
        };
        let row = self
            .client
            .query_one(sql, &[&raw])
            .map_err(|e| self.oracle_failure(&e))?;
        Ok(row.get::<_, Option<String>>(0))
    }

    fn spatially_equal(&mut self, a_ewkt: &str, b_ewkt: &str) -> std::result::Result<bool, String> {
        let sql = "SELECT ST_Equals(
                ST_SnapToGrid(ST_GeomFromEWKT($1::text), 1e-5),
                ST_SnapToGrid(ST_GeomFromEWKT($2::text), 1e-5)
            )";
        let row = self
            .client
            .query_one(sql, &[&a_ewkt, &b_ewkt])
            .map_err(|e| self.oracle_failure(&e))?;
        Ok(row.get::<_, Option<bool>>(0).unwrap_or(false))
    }

    fn z_sequence(&mut self, ewkt: &str) -> std::result::Result<Vec<Option<f64>>, String> {
        let sql = "SELECT ARRAY_AGG(ST_Z(dp.geom))
             FROM ST_DumpPoints(ST_GeomFromEWKT($1::text)) AS dp";
        let row = self
            .client
            .query_one(sql, &[&ewkt])
            .map_err(|e| self.oracle_failure(&e))?;
        row.get::<_, Option<Vec<Option<f64>>>>(0)
            .ok_or_else(|| "geometry dumped no points".to_owned())
    }
}
