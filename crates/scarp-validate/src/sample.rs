//! Spatial Sampler: value and zone at each point's pixel.

use geo::Point;
use rayon::prelude::*;
use scarp_raster::{Raster, Zone, ZoneRaster};
use serde::Serialize;
use tracing::debug;

use crate::error::ValidationError;
use crate::point::{Origin, PointSet};

/// One point paired with what the rasters hold at its pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub location: Point<f64>,
    pub value: Option<f64>,
    pub zone: Option<Zone>,
}

/// Serializable view of a [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleRecord {
    pub x: f64,
    pub y: f64,
    pub value: Option<f64>,
    pub zone: Option<Zone>,
}

impl From<&Sample> for SampleRecord {
    fn from(s: &Sample) -> Self {
        Self {
            x: s.location.x(),
            y: s.location.y(),
            value: s.value,
            zone: s.zone,
        }
    }
}

/// Reads a continuous surface and its zones on one grid.
#[derive(Debug, Clone, Copy)]
pub struct Sampler<'a> {
    values: &'a Raster,
    zones: &'a ZoneRaster,
}

impl<'a> Sampler<'a> {
    /// # Errors
    ///
    /// Returns [`ValidationError::Raster`] when the two grids differ.
    pub fn new(values: &'a Raster, zones: &'a ZoneRaster) -> Result<Self, ValidationError> {
        values.spec().ensure_same(zones.spec())?;
        Ok(Self { values, zones })
    }

    /// Sample every point, keeping input order. Points off the grid or on
    /// no-data pixels get `None`.
    #[must_use]
    pub fn sample(&self, points: &PointSet) -> Vec<Sample> {
        let samples: Vec<Sample> = points
            .points()
            .par_iter()
            .map(|p| {
                let (x, y) = (p.location.x(), p.location.y());
                Sample {
                    location: p.location,
                    value: self.values.value_at(x, y),
                    zone: self.zones.zone_at(x, y),
                }
            })
            .collect();
        debug!(
            origin = ?points.origin(),
            points = samples.len(),
            zoned = samples.iter().filter(|s| s.zone.is_some()).count(),
            "points sampled"
        );
        samples
    }
}

/// Samples of one point set, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSet {
    pub origin: Origin,
    pub samples: Vec<Sample>,
}

impl SampledSet {
    #[must_use]
    pub fn new(origin: Origin, samples: Vec<Sample>) -> Self {
        Self { origin, samples }
    }

    pub fn zones(&self) -> impl Iterator<Item = Zone> + '_ {
        self.samples.iter().filter_map(|s| s.zone)
    }

    #[must_use]
    pub fn records(&self) -> Vec<SampleRecord> {
        self.samples.iter().map(SampleRecord::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use scarp_raster::{Crs, GridSpec, Reducer, Tertiles};

    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(1, 3, 0.0, 1.0, 1.0, Crs::Projected { epsg: 32645 }).unwrap()
    }

    #[test]
    fn samples_value_and_zone_at_pixel() {
        let raster = Raster::new(grid(), vec![0.1, 0.5, 0.9]).unwrap();
        let zones = ZoneRaster::with_tertiles(&raster, Tertiles { p33: 0.3, p66: 0.7 });
        let sampler = Sampler::new(&raster, &zones).unwrap();
        let points = PointSet::synthetic(vec![Point::new(2.5, 0.5), Point::new(0.2, 0.9)]);
        let samples = sampler.sample(&points);
        assert_eq!(samples[0].value, Some(0.9));
        assert_eq!(samples[0].zone, Some(Zone::High));
        assert_eq!(samples[1].value, Some(0.1));
        assert_eq!(samples[1].zone, Some(Zone::Low));
    }

    #[test]
    fn off_grid_and_no_data_points_are_none() {
        let raster = Raster::new(grid(), vec![0.1, f64::NAN, 0.9]).unwrap();
        let zones = ZoneRaster::classify(&raster, &Reducer::new()).unwrap();
        let sampler = Sampler::new(&raster, &zones).unwrap();
        let points = PointSet::synthetic(vec![Point::new(1.5, 0.5), Point::new(-4.0, 0.5)]);
        for s in sampler.sample(&points) {
            assert_eq!(s.value, None);
            assert_eq!(s.zone, None);
        }
    }

    #[test]
    fn grid_mismatch_rejected() {
        let raster = Raster::new(grid(), vec![0.1, 0.5, 0.9]).unwrap();
        let other = GridSpec::new(1, 3, 10.0, 1.0, 1.0, Crs::Projected { epsg: 32645 }).unwrap();
        let zones = ZoneRaster::classify(&Raster::filled(other, 0.5), &Reducer::new()).unwrap();
        assert!(matches!(
            Sampler::new(&raster, &zones),
            Err(ValidationError::Raster(_))
        ));
    }
}
