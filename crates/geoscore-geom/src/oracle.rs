//! The canonicalization oracle seam.

/// Grid resolution applied by `spatially_equal` implementations before the
/// spatial-equality test, tolerating floating rounding between encodings.
pub const SNAP_GRID_SIZE: f64 = 1e-5;

/// How a raw cell spells its geometry, deciding the canonicalization route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GeometryEncoding {
    /// Hex-encoded WKB; decoded then tagged with SRID 4326.
    HexWkb,
    /// `SRID=4326;…` EWKT; routed through the geography cast.
    EwktGeography,
    /// Plain WKT (or a non-4326 SRID prefix); parsed then tagged 4326.
    Wkt,
}

/// Narrow capability interface over a live spatial SQL engine.
///
/// Three operations are all the comparison logic ever needs; substituting a
/// different backend never touches the strategies themselves. Errors are
/// plain strings: a failed oracle call fails one strategy for one cell, it is
/// never fatal to an evaluation.
pub trait GeometryOracle {
    /// Convert a raw value to canonical EWKT. `Ok(None)` means the engine
    /// produced SQL NULL (malformed but non-erroring input).
    ///
    /// # Errors
    ///
    /// Returns the engine-specific failure as a string.
    fn canonicalize(
        &mut self,
        raw: &str,
        encoding: GeometryEncoding,
    ) -> Result<Option<String>, String>;

    /// Spatial equality of two canonical EWKT values after grid snapping at
    /// [`SNAP_GRID_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns the engine-specific failure as a string.
    fn spatially_equal(&mut self, a_ewkt: &str, b_ewkt: &str) -> Result<bool, String>;

    /// The ordered Z coordinate of every dumped point; `None` entries are
    /// 2-D points.
    ///
    /// # Errors
    ///
    /// Returns the engine-specific failure as a string.
    fn z_sequence(&mut self, ewkt: &str) -> Result<Vec<Option<f64>>, String>;
}
