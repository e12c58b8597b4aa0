//! Categorical reclassification tables.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::RasterError;
use crate::grid::Raster;

/// Maps integer category codes to a risk ordinal in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    entries: BTreeMap<i64, f64>,
}

impl LookupTable {
    /// Build a table from `(code, ordinal)` pairs. Later pairs overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidLookupValue`] for an ordinal outside [0, 1].
    pub fn new(pairs: impl IntoIterator<Item = (i64, f64)>) -> Result<Self, RasterError> {
        let mut entries = BTreeMap::new();
        for (code, value) in pairs {
            if !(0.0..=1.0).contains(&value) {
                return Err(RasterError::InvalidLookupValue { code, value });
            }
            entries.insert(code, value);
        }
        Ok(Self { entries })
    }

    /// MODIS IGBP land-cover classes (`LC_Type1`).
    #[must_use]
    pub fn land_cover() -> Self {
        const TABLE: [(i64, f64); 18] = [
            (0, 0.0),
            (15, 0.0),
            (11, 0.1),
            (1, 0.1),
            (2, 0.1),
            (3, 0.2),
            (4, 0.2),
            (5, 0.3),
            (6, 0.4),
            (7, 0.4),
            (8, 0.5),
            (9, 0.5),
            (10, 0.6),
            (12, 0.7),
            (14, 0.8),
            (16, 0.9),
            (13, 1.0),
            (17, 1.0),
        ];
        Self {
            entries: TABLE.into_iter().collect(),
        }
    }

    /// USDA soil texture classes 1..=12, ranked 1..=3 and scaled by 1/3.
    ///
    /// Higher rank means higher risk; the rank is not inverted.
    #[must_use]
    pub fn soil_texture() -> Self {
        const RANKS: [u8; 12] = [3, 3, 3, 3, 2, 2, 2, 2, 1, 2, 1, 1];
        Self {
            entries: RANKS
                .iter()
                .enumerate()
                .map(|(i, &rank)| (i as i64 + 1, f64::from(rank) / 3.0))
                .collect(),
        }
    }

    /// Ordinal for `code`, if mapped.
    #[must_use]
    pub fn get(&self, code: i64) -> Option<f64> {
        self.entries.get(&code).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reclassify a categorical raster.
    ///
    /// Values are rounded to the nearest code. Codes missing from the table
    /// become no-data, never 0; the number of such pixels is logged.
    #[must_use]
    pub fn apply(&self, raster: &Raster) -> Raster {
        let out = raster.map(|v| self.get(v.round() as i64).unwrap_or(f64::NAN));
        let misses = raster.valid_count() - out.valid_count();
        if misses > 0 {
            warn!(misses, "pixels with unmapped category codes set to no-data");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Crs, GridSpec};

    #[test]
    fn land_cover_table_values() {
        let t = LookupTable::land_cover();
        assert_eq!(t.len(), 18);
        assert_eq!(t.get(13), Some(1.0));
        assert_eq!(t.get(15), Some(0.0));
        assert_eq!(t.get(10), Some(0.6));
        assert_eq!(t.get(18), None);
    }

    #[test]
    fn soil_texture_ranks_scaled() {
        let t = LookupTable::soil_texture();
        assert_eq!(t.get(1), Some(1.0));
        assert_eq!(t.get(9), Some(1.0 / 3.0));
        assert_eq!(t.get(10), Some(2.0 / 3.0));
        assert_eq!(t.get(0), None);
    }

    #[test]
    fn out_of_range_ordinal_rejected() {
        assert!(matches!(
            LookupTable::new([(1, 0.5), (2, 1.5)]),
            Err(RasterError::InvalidLookupValue { code: 2, .. })
        ));
    }

    #[test]
    fn lookup_miss_is_nodata_not_zero() {
        let spec = GridSpec::new(1, 3, 0.0, 0.0, 1.0, Crs::WGS84).unwrap();
        let r = Raster::new(spec, vec![13.0, 99.0, f64::NAN]).unwrap();
        let out = LookupTable::land_cover().apply(&r);
        assert_eq!(out.get(0, 0), Some(1.0));
        assert_eq!(out.get(0, 1), None);
        assert_eq!(out.get(0, 2), None);
    }
}
