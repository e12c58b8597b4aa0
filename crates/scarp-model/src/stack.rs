//! Multi-band feature stack over the common grid.

use scarp_raster::{FactorKind, FactorSet, GridSpec, PopulationMask, Raster, RasterError};
use tracing::debug;

/// One raster per classifier band, all on one grid.
#[derive(Debug, Clone)]
pub struct FeatureStack {
    grid: GridSpec,
    kinds: Vec<FactorKind>,
    bands: Vec<Raster>,
}

impl FeatureStack {
    /// Stack the classifier bands ([`FactorKind::CLASSIFIER_BANDS`]) of
    /// `factors`, unrounded.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::MissingFactor`] when a band is absent.
    pub fn from_factors(factors: &FactorSet) -> Result<Self, RasterError> {
        Self::with_bands(factors, &FactorKind::CLASSIFIER_BANDS)
    }

    /// Stack an explicit band list, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::MissingFactor`] when a band is absent.
    pub fn with_bands(factors: &FactorSet, kinds: &[FactorKind]) -> Result<Self, RasterError> {
        let bands = kinds
            .iter()
            .map(|&kind| {
                factors
                    .get(kind)
                    .map(|layer| layer.raster().clone())
                    .ok_or(RasterError::MissingFactor { kind })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            grid: *factors.grid(),
            kinds: kinds.to_vec(),
            bands,
        })
    }

    /// Every band restricted to populated pixels.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] when the mask is on another grid.
    pub fn masked(&self, mask: &PopulationMask) -> Result<Self, RasterError> {
        let bands = self
            .bands
            .iter()
            .map(|b| mask.restrict(b))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(populated = mask.populated_cells(), "feature stack masked");
        Ok(Self {
            grid: self.grid,
            kinds: self.kinds.clone(),
            bands,
        })
    }

    #[must_use]
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    #[must_use]
    pub fn kinds(&self) -> &[FactorKind] {
        &self.kinds
    }

    #[must_use]
    pub fn band_names(&self) -> Vec<String> {
        self.kinds.iter().map(|k| k.band_name().to_string()).collect()
    }

    #[must_use]
    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    /// Feature vector at a cell index, `None` if any band is no-data.
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<Vec<f64>> {
        self.bands.iter().map(|b| b.get_index(index)).collect()
    }

    /// Feature vector at the pixel containing `(x, y)`.
    #[must_use]
    pub fn sample_at(&self, x: f64, y: f64) -> Option<Vec<f64>> {
        let (r, c) = self.grid.cell_of(x, y)?;
        self.pixel(self.grid.index(r, c))
    }
}

#[cfg(test)]
mod tests {
    use scarp_raster::{Crs, FactorLayer};

    use super::*;

    fn factors(missing_at: usize) -> FactorSet {
        let spec = GridSpec::new(2, 2, 0.0, 2.0, 1.0, Crs::Projected { epsg: 32645 }).unwrap();
        let layers = FactorKind::CLASSIFIER_BANDS
            .iter()
            .enumerate()
            .map(|(b, &kind)| {
                let raster = Raster::from_fn(spec, |r, c| {
                    let i = spec.index(r, c);
                    if b == 0 && i == missing_at { f64::NAN } else { (b as f64 + 1.0) / 10.0 }
                });
                FactorLayer::from_normalized(kind, raster).unwrap()
            })
            .collect();
        FactorSet::from_layers(layers).unwrap()
    }

    #[test]
    fn bands_follow_classifier_order() {
        let stack = FeatureStack::from_factors(&factors(99)).unwrap();
        assert_eq!(
            stack.band_names(),
            ["slope", "drainDen", "elev", "clay", "landcover", "soiltex"]
        );
        assert_eq!(stack.pixel(0).unwrap(), [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn any_missing_band_makes_pixel_missing() {
        let stack = FeatureStack::from_factors(&factors(3)).unwrap();
        assert!(stack.pixel(3).is_none());
        assert!(stack.sample_at(1.5, 0.5).is_none());
        assert!(stack.sample_at(0.5, 0.5).is_some());
    }

    #[test]
    fn absent_band_is_an_error() {
        let set = factors(99);
        let err = FeatureStack::with_bands(&set, &[FactorKind::DistanceToDrainage]).unwrap_err();
        assert!(matches!(err, RasterError::MissingFactor { .. }));
    }

    #[test]
    fn masked_stack_drops_unpopulated_pixels() {
        let set = factors(99);
        let pop = Raster::new(*set.grid(), vec![1.0, 0.0, 0.0, 3.0]).unwrap();
        let mask = PopulationMask::from_counts(&pop, set.grid()).unwrap();
        let stack = FeatureStack::from_factors(&set).unwrap().masked(&mask).unwrap();
        assert!(stack.pixel(0).is_some());
        assert!(stack.pixel(1).is_none());
        assert!(stack.pixel(3).is_some());
    }
}
