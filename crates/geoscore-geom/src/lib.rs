//! Geometry classification and comparison for GeoScore.
//!
//! The hard geometry work (parsing, spatial equality, point dumping) is not
//! reimplemented here: it is delegated to a [`GeometryOracle`], a narrow
//! capability seam normally backed by a live PostGIS connection. This crate
//! decides *what* to ask the oracle and how to interpret its answers.

pub mod classify;
pub mod compare;
pub mod oracle;

pub use classify::{cell_encoding, cell_to_ewkt, column_is_geometry, is_hex_wkb, is_wkt_literal};
pub use compare::{
    column_passes, compare_geometry_columns, compare_text_columns, z_sequences_match, Z_TOLERANCE,
};
pub use oracle::{GeometryEncoding, GeometryOracle, SNAP_GRID_SIZE};
