//! Zonation Engine: tertile classification into Low/Medium/High.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::RasterError;
use crate::grid::{GridSpec, Raster};
use crate::reduce::Reducer;

/// Risk zone. Codes match the categorical raster values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Low, Zone::Medium, Zone::High];

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Zone::Low),
            2 => Some(Zone::Medium),
            3 => Some(Zone::High),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Zone::Low => "low",
            Zone::Medium => "medium",
            Zone::High => "high",
        })
    }
}

/// The 33rd and 66th percentile breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tertiles {
    pub p33: f64,
    pub p66: f64,
}

impl Tertiles {
    /// `v < p33` is Low, `p33 <= v < p66` is Medium, anything else High.
    #[must_use]
    pub fn classify(&self, v: f64) -> Zone {
        if v < self.p33 {
            Zone::Low
        } else if v < self.p66 {
            Zone::Medium
        } else {
            Zone::High
        }
    }
}

/// Pixel or point tally per zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl ZoneCounts {
    pub fn add(&mut self, zone: Zone) {
        *self.get_mut(zone) += 1;
    }

    #[must_use]
    pub fn get(&self, zone: Zone) -> usize {
        match zone {
            Zone::Low => self.low,
            Zone::Medium => self.medium,
            Zone::High => self.high,
        }
    }

    fn get_mut(&mut self, zone: Zone) -> &mut usize {
        match zone {
            Zone::Low => &mut self.low,
            Zone::Medium => &mut self.medium,
            Zone::High => &mut self.high,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }

    /// Share of the total in `zone`, 0 for an empty tally.
    #[must_use]
    pub fn fraction(&self, zone: Zone) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.get(zone) as f64 / n as f64,
        }
    }
}

impl FromIterator<Zone> for ZoneCounts {
    fn from_iter<I: IntoIterator<Item = Zone>>(iter: I) -> Self {
        let mut counts = ZoneCounts::default();
        for zone in iter {
            counts.add(zone);
        }
        counts
    }
}

/// Categorical zone map; `None` outside the source's valid pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRaster {
    spec: GridSpec,
    zones: Vec<Option<Zone>>,
    tertiles: Tertiles,
}

impl ZoneRaster {
    /// Classify `raster` at its own 33rd/66th percentiles.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::EmptyRaster`] when `raster` has no valid pixel.
    #[instrument(skip_all, fields(grid = %raster.spec()))]
    pub fn classify(raster: &Raster, reducer: &Reducer) -> Result<Self, RasterError> {
        let p = reducer
            .percentiles(raster, &[33.0, 66.0])
            .ok_or(RasterError::EmptyRaster)?;
        let tertiles = Tertiles {
            p33: p[0],
            p66: p[1],
        };
        let zones = Self::with_tertiles(raster, tertiles);
        let counts = zones.counts();
        info!(
            p33 = tertiles.p33,
            p66 = tertiles.p66,
            low = counts.low,
            medium = counts.medium,
            high = counts.high,
            "zonation complete"
        );
        Ok(zones)
    }

    /// Classify `raster` with fixed breakpoints.
    #[must_use]
    pub fn with_tertiles(raster: &Raster, tertiles: Tertiles) -> Self {
        let zones = raster
            .data()
            .iter()
            .map(|&v| (!v.is_nan()).then(|| tertiles.classify(v)))
            .collect();
        Self {
            spec: *raster.spec(),
            zones,
            tertiles,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    #[must_use]
    pub fn tertiles(&self) -> Tertiles {
        self.tertiles
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Zone> {
        if row >= self.spec.rows() || col >= self.spec.cols() {
            return None;
        }
        self.get_index(self.spec.index(row, col))
    }

    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<Zone> {
        self.zones.get(index).copied().flatten()
    }

    /// Zone of the pixel containing `(x, y)`.
    #[must_use]
    pub fn zone_at(&self, x: f64, y: f64) -> Option<Zone> {
        let (r, c) = self.spec.cell_of(x, y)?;
        self.get(r, c)
    }

    /// Pixel count per zone.
    #[must_use]
    pub fn counts(&self) -> ZoneCounts {
        self.zones.iter().flatten().copied().collect()
    }

    /// Zone codes as a raster (1/2/3, NaN outside).
    #[must_use]
    pub fn to_raster(&self) -> Raster {
        let data = self
            .zones
            .iter()
            .map(|z| z.map_or(f64::NAN, |z| f64::from(z.code())))
            .collect();
        Raster::from_parts(self.spec, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Crs;

    fn sequence(n: usize) -> Raster {
        let spec = GridSpec::new(n / 100, 100, 0.0, 0.0, 1.0, Crs::WGS84).unwrap();
        Raster::from_fn(spec, |r, c| (r * 100 + c) as f64 / n as f64)
    }

    #[test]
    fn tertile_partition_covers_every_valid_pixel() {
        let raster = sequence(10_000);
        let zones = ZoneRaster::classify(&raster, &Reducer::new()).unwrap();
        let counts = zones.counts();
        assert_eq!(counts.total(), raster.valid_count());
        for zone in Zone::ALL {
            let share = counts.fraction(zone);
            assert!((share - 1.0 / 3.0).abs() < 0.02, "{zone}: {share}");
        }
    }

    #[test]
    fn nodata_stays_unzoned() {
        let spec = GridSpec::new(1, 4, 0.0, 0.0, 1.0, Crs::WGS84).unwrap();
        let raster = Raster::new(spec, vec![0.1, f64::NAN, 0.5, 0.9]).unwrap();
        let zones = ZoneRaster::classify(&raster, &Reducer::new()).unwrap();
        assert_eq!(zones.get(0, 1), None);
        assert_eq!(zones.counts().total(), 3);
        assert!(zones.to_raster().get(0, 1).is_none());
    }

    #[test]
    fn breakpoints_are_half_open() {
        let t = Tertiles { p33: 0.3, p66: 0.6 };
        assert_eq!(t.classify(0.29), Zone::Low);
        assert_eq!(t.classify(0.3), Zone::Medium);
        assert_eq!(t.classify(0.6), Zone::High);
    }

    #[test]
    fn empty_raster_cannot_be_zoned() {
        let spec = GridSpec::new(1, 2, 0.0, 0.0, 1.0, Crs::WGS84).unwrap();
        let raster = Raster::filled(spec, f64::NAN);
        assert!(matches!(
            ZoneRaster::classify(&raster, &Reducer::new()),
            Err(RasterError::EmptyRaster)
        ));
    }

    #[test]
    fn zone_codes_round_trip() {
        for zone in Zone::ALL {
            assert_eq!(Zone::from_code(zone.code()), Some(zone));
        }
        assert_eq!(Zone::from_code(0), None);
    }
}
