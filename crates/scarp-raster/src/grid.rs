//! Grid geometry and the in-memory raster type.
//!
//! A [`Raster`] is a row-major `Vec<f64>` bound to a [`GridSpec`]. No-data is
//! stored as NaN and surfaced as `None` by every accessor, so a missing pixel
//! can never be mistaken for a real zero.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::RasterError;

/// Metres per degree of latitude (spherical approximation).
pub const METRES_PER_DEGREE: f64 = 111_320.0;

/// Coordinate reference system of a grid, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Longitude/latitude in degrees.
    Geographic {
        /// EPSG code.
        epsg: u32,
    },
    /// Planar coordinates in metres.
    Projected {
        /// EPSG code.
        epsg: u32,
    },
}

impl Crs {
    /// WGS 84 longitude/latitude.
    pub const WGS84: Crs = Crs::Geographic { epsg: 4326 };

    /// Build a CRS from an EPSG code.
    ///
    /// The common geographic datums (4326, 4269, 4258) are geographic; every
    /// other code is treated as a metre-based projection.
    #[must_use]
    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4326 | 4269 | 4258 => Crs::Geographic { epsg },
            _ => Crs::Projected { epsg },
        }
    }

    /// Return the EPSG code.
    #[must_use]
    pub fn epsg(self) -> u32 {
        match self {
            Crs::Geographic { epsg } | Crs::Projected { epsg } => epsg,
        }
    }

    /// Return `true` for degree-based coordinate systems.
    #[must_use]
    pub fn is_geographic(self) -> bool {
        matches!(self, Crs::Geographic { .. })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .and_then(|_| trimmed[5..].parse::<u32>().ok())
            .ok_or_else(|| RasterError::InvalidCrs {
                raw: s.to_string(),
            })?;
        Ok(Crs::from_epsg(code))
    }
}

/// Size, placement and CRS of a regular grid.
///
/// `west`/`north` locate the outer corner of cell `(0, 0)`; rows grow
/// southwards and columns eastwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    rows: usize,
    cols: usize,
    west: f64,
    north: f64,
    cell_size: f64,
    crs: Crs,
}

impl GridSpec {
    /// Create a grid.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] when `rows` or `cols` is zero or
    /// `cell_size` is not a positive finite number.
    pub fn new(
        rows: usize,
        cols: usize,
        west: f64,
        north: f64,
        cell_size: f64,
        crs: Crs,
    ) -> Result<Self, RasterError> {
        if rows == 0 || cols == 0 || !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(RasterError::InvalidGrid {
                rows,
                cols,
                cell_size,
            });
        }
        Ok(Self {
            rows,
            cols,
            west,
            north,
            cell_size,
            crs,
        })
    }

    /// Grid covering the same extent as `self` at a different cell size.
    ///
    /// Row and column counts are rounded up so the new grid never clips the
    /// original extent.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] for a non-positive `cell_size`.
    pub fn with_cell_size(&self, cell_size: f64) -> Result<Self, RasterError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(RasterError::InvalidGrid {
                rows: self.rows,
                cols: self.cols,
                cell_size,
            });
        }
        let rows = (self.height() / cell_size).ceil().max(1.0) as usize;
        let cols = (self.width() / cell_size).ceil().max(1.0) as usize;
        Self::new(rows, cols, self.west, self.north, cell_size, self.crs)
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn west(&self) -> f64 {
        self.west
    }

    #[must_use]
    pub fn north(&self) -> f64 {
        self.north
    }

    #[must_use]
    pub fn east(&self) -> f64 {
        self.west + self.width()
    }

    #[must_use]
    pub fn south(&self) -> f64 {
        self.north - self.height()
    }

    /// Cell edge length in CRS units (degrees or metres).
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Always `false`; a grid has at least one cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    fn width(&self) -> f64 {
        self.cols as f64 * self.cell_size
    }

    fn height(&self) -> f64 {
        self.rows as f64 * self.cell_size
    }

    /// Row-major index of `(row, col)`.
    #[inline]
    #[must_use]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Inverse of [`GridSpec::index`].
    #[inline]
    #[must_use]
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }

    /// Coordinates of the centre of cell `(row, col)`.
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.cell_size,
            self.north - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Cell containing `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let fc = (x - self.west) / self.cell_size;
        let fr = (self.north - y) / self.cell_size;
        if fc < 0.0 || fr < 0.0 {
            return None;
        }
        let (row, col) = (fr.floor() as usize, fc.floor() as usize);
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    /// Isotropic cell size in metres.
    ///
    /// Geographic grids average the north-south and east-west extents at the
    /// grid's mid latitude.
    #[must_use]
    pub fn cell_size_m(&self) -> f64 {
        if !self.crs.is_geographic() {
            return self.cell_size;
        }
        let mid_lat = self.north - self.height() / 2.0;
        let cy = self.cell_size * METRES_PER_DEGREE;
        let cx = cy * mid_lat.to_radians().cos();
        (cy + cx) / 2.0
    }

    /// Area of one cell of `row` in km².
    #[must_use]
    pub fn cell_area_km2(&self, row: usize) -> f64 {
        if self.crs.is_geographic() {
            let (_, lat) = self.cell_center(row, 0);
            let dy_km = self.cell_size * METRES_PER_DEGREE / 1000.0;
            let dx_km = dy_km * lat.to_radians().cos().abs();
            dx_km * dy_km
        } else {
            self.cell_size * self.cell_size / 1.0e6
        }
    }

    /// Return `true` when both grids have identical geometry and CRS.
    #[must_use]
    pub fn same_grid(&self, other: &GridSpec) -> bool {
        const TOL: f64 = 1e-9;
        self.rows == other.rows
            && self.cols == other.cols
            && self.crs == other.crs
            && (self.west - other.west).abs() < TOL
            && (self.north - other.north).abs() < TOL
            && (self.cell_size - other.cell_size).abs() < TOL
    }

    /// Require `other` to be the same grid as `self`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] when the grids differ.
    pub fn ensure_same(&self, other: &GridSpec) -> Result<(), RasterError> {
        if self.same_grid(other) {
            Ok(())
        } else {
            Err(RasterError::GridMismatch {
                expected: *self,
                found: *other,
            })
        }
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {} from ({}, {}) [{}]",
            self.rows, self.cols, self.cell_size, self.west, self.north, self.crs
        )
    }
}

/// A single-band grid of `f64` values with NaN as no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    spec: GridSpec,
    data: Vec<f64>,
}

impl Raster {
    /// Wrap a row-major buffer.
    ///
    /// Infinite values are stored as no-data.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DataLengthMismatch`] if `data.len() != spec.len()`.
    pub fn new(spec: GridSpec, mut data: Vec<f64>) -> Result<Self, RasterError> {
        if data.len() != spec.len() {
            return Err(RasterError::DataLengthMismatch {
                expected: spec.len(),
                got: data.len(),
            });
        }
        for v in &mut data {
            if v.is_infinite() {
                *v = f64::NAN;
            }
        }
        Ok(Self { spec, data })
    }

    /// Wrap a buffer already known to match `spec`.
    pub(crate) fn from_parts(spec: GridSpec, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), spec.len());
        Self { spec, data }
    }

    /// A raster where every cell holds `value`.
    #[must_use]
    pub fn filled(spec: GridSpec, value: f64) -> Self {
        Self {
            spec,
            data: vec![value; spec.len()],
        }
    }

    /// Build a raster by evaluating `f(row, col)` for every cell.
    #[must_use]
    pub fn from_fn(spec: GridSpec, f: impl Fn(usize, usize) -> f64) -> Self {
        let data = (0..spec.len())
            .map(|i| {
                let (r, c) = spec.row_col(i);
                let v = f(r, c);
                if v.is_finite() { v } else { f64::NAN }
            })
            .collect();
        Self { spec, data }
    }

    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Raw row-major buffer (NaN = no-data).
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Value of `(row, col)`, `None` for no-data or out-of-range cells.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.spec.rows || col >= self.spec.cols {
            return None;
        }
        self.get_index(self.spec.index(row, col))
    }

    /// Value at a row-major index.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<f64> {
        self.data.get(index).copied().filter(|v| !v.is_nan())
    }

    /// Value of the pixel containing `(x, y)`.
    #[must_use]
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let (r, c) = self.spec.cell_of(x, y)?;
        self.get(r, c)
    }

    /// Iterator over the valid (non-NaN) values.
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }

    /// Number of valid pixels.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Apply `f` to every valid pixel; no-data stays no-data.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64 + Sync) -> Raster {
        let data = self
            .data
            .par_iter()
            .map(|&v| {
                if v.is_nan() {
                    return f64::NAN;
                }
                let out = f(v);
                if out.is_finite() { out } else { f64::NAN }
            })
            .collect();
        Raster {
            spec: self.spec,
            data,
        }
    }

    /// Combine two rasters on the same grid pixel by pixel.
    ///
    /// The result is no-data wherever either input is.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] when the grids differ.
    pub fn zip_with(
        &self,
        other: &Raster,
        f: impl Fn(f64, f64) -> f64 + Sync,
    ) -> Result<Raster, RasterError> {
        self.spec.ensure_same(&other.spec)?;
        let data = self
            .data
            .par_iter()
            .zip(other.data.par_iter())
            .map(|(&a, &b)| {
                if a.is_nan() || b.is_nan() {
                    return f64::NAN;
                }
                let out = f(a, b);
                if out.is_finite() { out } else { f64::NAN }
            })
            .collect();
        Ok(Raster {
            spec: self.spec,
            data,
        })
    }

    /// Keep pixels whose index satisfies `keep`; the rest become no-data.
    #[must_use]
    pub fn retain(&self, keep: impl Fn(usize) -> bool + Sync) -> Raster {
        let data = self
            .data
            .par_iter()
            .enumerate()
            .map(|(i, &v)| if keep(i) { v } else { f64::NAN })
            .collect();
        Raster {
            spec: self.spec,
            data,
        }
    }

    /// Consume the raster and return its grid and buffer.
    #[must_use]
    pub fn into_parts(self) -> (GridSpec, Vec<f64>) {
        (self.spec, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(rows: usize, cols: usize) -> GridSpec {
        GridSpec::new(rows, cols, 80.0, 30.0, 0.5, Crs::WGS84).unwrap()
    }

    #[test]
    fn crs_parses_epsg_strings() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!(
            "epsg:32645".parse::<Crs>().unwrap(),
            Crs::Projected { epsg: 32645 }
        );
        assert!("WGS84".parse::<Crs>().is_err());
        assert_eq!(Crs::WGS84.to_string(), "EPSG:4326");
    }

    #[test]
    fn invalid_grid_rejected() {
        assert!(GridSpec::new(0, 3, 0.0, 0.0, 1.0, Crs::WGS84).is_err());
        assert!(GridSpec::new(3, 3, 0.0, 0.0, 0.0, Crs::WGS84).is_err());
        assert!(GridSpec::new(3, 3, 0.0, 0.0, f64::NAN, Crs::WGS84).is_err());
    }

    #[test]
    fn cell_of_inverts_cell_center() {
        let s = spec(4, 6);
        for r in 0..4 {
            for c in 0..6 {
                let (x, y) = s.cell_center(r, c);
                assert_eq!(s.cell_of(x, y), Some((r, c)));
            }
        }
        assert_eq!(s.cell_of(79.9, 29.0), None);
        assert_eq!(s.cell_of(81.0, 30.1), None);
        assert_eq!(s.cell_of(83.1, 29.0), None);
    }

    #[test]
    fn with_cell_size_covers_extent() {
        let s = spec(4, 6).with_cell_size(2.0).unwrap();
        assert_eq!((s.rows(), s.cols()), (1, 2));
        assert!(s.east() >= 83.0);
    }

    #[test]
    fn projected_cell_area() {
        let s = GridSpec::new(2, 2, 0.0, 0.0, 1000.0, Crs::from_epsg(32645)).unwrap();
        assert!((s.cell_area_km2(0) - 1.0).abs() < 1e-12);
        assert!((s.cell_size_m() - 1000.0).abs() < 1e-12);
    }

    #[test]
    fn geographic_cell_area_shrinks_with_latitude() {
        let equator = GridSpec::new(1, 1, 0.0, 0.5, 1.0, Crs::WGS84).unwrap();
        let north = GridSpec::new(1, 1, 0.0, 60.5, 1.0, Crs::WGS84).unwrap();
        assert!(equator.cell_area_km2(0) > north.cell_area_km2(0) * 1.9);
    }

    #[test]
    fn new_rejects_wrong_length_and_stores_infinity_as_nodata() {
        let s = spec(2, 2);
        assert!(matches!(
            Raster::new(s, vec![1.0; 3]),
            Err(RasterError::DataLengthMismatch { expected: 4, got: 3 })
        ));
        let r = Raster::new(s, vec![1.0, f64::INFINITY, f64::NAN, 4.0]).unwrap();
        assert_eq!(r.get(0, 1), None);
        assert_eq!(r.get(1, 0), None);
        assert_eq!(r.valid_count(), 2);
    }

    #[test]
    fn map_preserves_nodata() {
        let r = Raster::new(spec(1, 3), vec![1.0, f64::NAN, 3.0]).unwrap();
        let doubled = r.map(|v| v * 2.0);
        assert_eq!(doubled.get(0, 0), Some(2.0));
        assert_eq!(doubled.get(0, 1), None);
        assert_eq!(doubled.get(0, 2), Some(6.0));
    }

    #[test]
    fn zip_with_rejects_different_grids() {
        let a = Raster::filled(spec(2, 2), 1.0);
        let b = Raster::filled(spec(2, 3), 1.0);
        assert!(matches!(a.zip_with(&b, |x, y| x + y), Err(RasterError::GridMismatch { .. })));
    }

    #[test]
    fn retain_masks_by_index() {
        let r = Raster::filled(spec(1, 4), 0.5);
        let kept = r.retain(|i| i % 2 == 0);
        assert_eq!(kept.valid_count(), 2);
        assert_eq!(kept.get(0, 1), None);
    }
}
