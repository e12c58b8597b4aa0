//! Study-area polygon and seeded synthetic point generation.

use geo::{Area, BoundingRect, Contains, GeodesicArea, Point, Polygon, Rect};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scarp_raster::{Crs, PopulationMask};
use tracing::{info, instrument, warn};

use crate::error::ValidationError;
use crate::point::PointSet;

/// Configuration for synthetic point generation.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `seed` | 42 |
/// | `attempts_per_point` | 1000 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticConfig {
    count: usize,
    seed: u64,
    attempts_per_point: usize,
}

impl SyntheticConfig {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidParameter`] when `count` is zero.
    pub fn new(count: usize) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err(ValidationError::InvalidParameter {
                parameter: "count",
                value: 0.0,
            });
        }
        Ok(Self {
            count,
            seed: 42,
            attempts_per_point: 1000,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rejection-sampling budget per requested point.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidParameter`] when `attempts` is zero.
    pub fn with_attempts_per_point(mut self, attempts: usize) -> Result<Self, ValidationError> {
        if attempts == 0 {
            return Err(ValidationError::InvalidParameter {
                parameter: "attempts_per_point",
                value: 0.0,
            });
        }
        self.attempts_per_point = attempts;
        Ok(self)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn attempts_per_point(&self) -> usize {
        self.attempts_per_point
    }
}

/// The polygon synthetic points are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyArea {
    polygon: Polygon<f64>,
    bbox: Rect<f64>,
}

impl StudyArea {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStudyArea`] when the polygon is
    /// empty, has non-finite coordinates, or encloses no area.
    pub fn new(polygon: Polygon<f64>) -> Result<Self, ValidationError> {
        let bbox = polygon
            .bounding_rect()
            .ok_or_else(|| ValidationError::InvalidStudyArea {
                reason: "polygon has no vertices".to_string(),
            })?;
        if polygon
            .exterior()
            .coords()
            .any(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(ValidationError::InvalidStudyArea {
                reason: "polygon has non-finite coordinates".to_string(),
            });
        }
        if polygon.unsigned_area() <= 0.0 {
            return Err(ValidationError::InvalidStudyArea {
                reason: "polygon encloses no area".to_string(),
            });
        }
        Ok(Self { polygon, bbox })
    }

    #[must_use]
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.polygon.contains(point)
    }

    /// Area in km², geodesic for geographic coordinates.
    #[must_use]
    pub fn area_km2(&self, crs: Crs) -> f64 {
        polygon_area_km2(&self.polygon, crs)
    }

    /// Uniform points inside the polygon by rejection sampling in its
    /// bounding box. Equal configs give bit-identical sets.
    ///
    /// Stops early, with a warning, when the attempt budget runs out.
    #[instrument(skip_all, fields(count = config.count(), seed = config.seed()))]
    pub fn generate(&self, config: &SyntheticConfig) -> PointSet {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
        let (min, max) = (self.bbox.min(), self.bbox.max());
        let budget = config.count().saturating_mul(config.attempts_per_point());
        let mut points = Vec::with_capacity(config.count());
        let mut attempts = 0usize;
        while points.len() < config.count() && attempts < budget {
            attempts += 1;
            let candidate = Point::new(
                min.x + rng.r#gen::<f64>() * (max.x - min.x),
                min.y + rng.r#gen::<f64>() * (max.y - min.y),
            );
            if self.polygon.contains(&candidate) {
                points.push(candidate);
            }
        }
        if points.len() < config.count() {
            warn!(
                requested = config.count(),
                generated = points.len(),
                attempts,
                "attempt budget exhausted before reaching the requested count"
            );
        }
        PointSet::synthetic(points)
    }

    /// `config.count()` synthetic points on populated pixels.
    ///
    /// Generates `count × oversample_factor` candidates with the same seed
    /// and keeps the first `count` that fall on populated pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoPopulatedArea`] when the mask has no
    /// populated cells.
    #[instrument(skip_all, fields(count = config.count(), seed = config.seed()))]
    pub fn generate_populated(
        &self,
        config: &SyntheticConfig,
        mask: &PopulationMask,
    ) -> Result<PointSet, ValidationError> {
        let domain_km2 = self.area_km2(mask.spec().crs());
        let factor = oversample_factor(domain_km2, mask.populated_area_km2())?;
        let candidates = SyntheticConfig {
            count: config.count().saturating_mul(factor),
            ..*config
        };
        let kept = self
            .generate(&candidates)
            .populated(mask)
            .take(config.count());
        info!(
            factor,
            candidates = candidates.count(),
            kept = kept.len(),
            "populated synthetic points generated"
        );
        if kept.len() < config.count() {
            warn!(
                requested = config.count(),
                kept = kept.len(),
                "too few candidates landed on populated pixels"
            );
        }
        Ok(kept)
    }
}

/// `ceil(domain ÷ populated)`, never below 1.
///
/// # Errors
///
/// Returns [`ValidationError::NoPopulatedArea`] when `populated_km2` is not
/// positive.
pub fn oversample_factor(domain_km2: f64, populated_km2: f64) -> Result<usize, ValidationError> {
    if populated_km2.is_nan() || populated_km2 <= 0.0 {
        return Err(ValidationError::NoPopulatedArea { domain_km2 });
    }
    Ok((domain_km2 / populated_km2).ceil().max(1.0) as usize)
}

/// Polygon area in km²: geodesic for geographic CRSs, planar metres otherwise.
#[must_use]
pub fn polygon_area_km2(polygon: &Polygon<f64>, crs: Crs) -> f64 {
    let m2 = if crs.is_geographic() {
        polygon.geodesic_area_unsigned()
    } else {
        polygon.unsigned_area()
    };
    m2 / 1.0e6
}
