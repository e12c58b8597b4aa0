//! Population Gate: populated-pixel mask and population-restricted surfaces.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::composite::SusceptibilityRaster;
use crate::error::RasterError;
use crate::grid::{GridSpec, Raster};
use crate::reduce::Reducer;
use crate::resample::Resampling;
use crate::zone::{Zone, ZoneRaster};

/// Binary populated/unpopulated mask on the common grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationMask {
    counts: Raster,
    populated: Vec<bool>,
}

impl PopulationMask {
    /// Aggregate a population-count raster onto `target` by areal sum and
    /// mark cells with a count above zero.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::CrsMismatch`] when the CRSs differ.
    #[instrument(skip_all, fields(target = %target))]
    pub fn from_counts(population: &Raster, target: &GridSpec) -> Result<Self, RasterError> {
        let counts = population.resample(target, Resampling::Sum)?;
        let populated: Vec<bool> = counts.data().iter().map(|&v| v > 0.0).collect();
        let mask = Self { counts, populated };
        info!(
            populated_cells = mask.populated_cells(),
            populated_km2 = mask.populated_area_km2(),
            "population mask built"
        );
        Ok(mask)
    }

    #[must_use]
    pub fn spec(&self) -> &GridSpec {
        self.counts.spec()
    }

    /// Aggregated counts on the common grid.
    #[must_use]
    pub fn counts(&self) -> &Raster {
        &self.counts
    }

    #[must_use]
    pub fn is_populated(&self, row: usize, col: usize) -> bool {
        row < self.spec().rows()
            && col < self.spec().cols()
            && self.populated[self.spec().index(row, col)]
    }

    /// Whether the pixel containing `(x, y)` is populated.
    #[must_use]
    pub fn is_populated_at(&self, x: f64, y: f64) -> bool {
        self.spec()
            .cell_of(x, y)
            .is_some_and(|(r, c)| self.is_populated(r, c))
    }

    #[must_use]
    pub fn populated_cells(&self) -> usize {
        self.populated.iter().filter(|&&p| p).count()
    }

    /// Total area of populated cells in km².
    #[must_use]
    pub fn populated_area_km2(&self) -> f64 {
        let spec = self.spec();
        (0..spec.len())
            .filter(|&i| self.populated[i])
            .map(|i| spec.cell_area_km2(spec.row_col(i).0))
            .sum()
    }

    /// Total population on the grid.
    #[must_use]
    pub fn total_population(&self) -> f64 {
        self.counts.valid_values().sum()
    }

    /// Restrict `raster` to populated cells; everything else becomes no-data.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] when `raster` is not on the mask grid.
    pub fn restrict(&self, raster: &Raster) -> Result<Raster, RasterError> {
        self.spec().ensure_same(raster.spec())?;
        Ok(raster.retain(|i| self.populated[i]))
    }

    /// Population-masked susceptibility, renormalized over the populated domain.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] when `susceptibility` is not on the mask grid.
    pub fn gate(
        &self,
        susceptibility: &SusceptibilityRaster,
        reducer: &Reducer,
    ) -> Result<SusceptibilityRaster, RasterError> {
        let raw = self.restrict(susceptibility.raw())?;
        Ok(SusceptibilityRaster::from_raw(raw, reducer, true))
    }

    /// Population living in each zone.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] when `zones` is not on the mask grid.
    pub fn population_by_zone(&self, zones: &ZoneRaster) -> Result<ZonePopulation, RasterError> {
        self.spec().ensure_same(zones.spec())?;
        let mut out = ZonePopulation::default();
        for i in 0..self.spec().len() {
            if let (Some(zone), Some(count)) = (zones.get_index(i), self.counts.get_index(i)) {
                *out.get_mut(zone) += count;
            }
        }
        Ok(out)
    }
}

/// Total domain area in km² (every cell, valid or not).
#[must_use]
pub fn domain_area_km2(spec: &GridSpec) -> f64 {
    (0..spec.rows())
        .map(|r| spec.cell_area_km2(r) * spec.cols() as f64)
        .sum()
}

/// Area in km² of the valid pixels of `raster`.
#[must_use]
pub fn valid_area_km2(raster: &Raster) -> f64 {
    let spec = raster.spec();
    (0..spec.len())
        .filter(|&i| raster.get_index(i).is_some())
        .map(|i| spec.cell_area_km2(spec.row_col(i).0))
        .sum()
}

/// Population at risk per zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonePopulation {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl ZonePopulation {
    #[must_use]
    pub fn get(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Low => self.low,
            Zone::Medium => self.medium,
            Zone::High => self.high,
        }
    }

    fn get_mut(&mut self, zone: Zone) -> &mut f64 {
        match zone {
            Zone::Low => &mut self.low,
            Zone::Medium => &mut self.medium,
            Zone::High => &mut self.high,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.low + self.medium + self.high
    }

    /// Percentage of the zoned population living in `zone`.
    #[must_use]
    pub fn percentage(&self, zone: Zone) -> f64 {
        let total = self.total();
        if total > 0.0 {
            100.0 * self.get(zone) / total
        } else {
            0.0
        }
    }
}
