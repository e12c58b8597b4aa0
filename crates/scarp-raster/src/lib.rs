//! Raster grids and the susceptibility pipeline stages that operate on them:
//! factor layers, weighted compositing, population gating and zonation.

pub mod composite;
pub mod error;
pub mod factor;
pub mod grid;
pub mod hydrology;
pub mod lookup;
pub mod population;
pub mod reduce;
pub mod resample;
pub mod terrain;
pub mod zone;

pub use composite::{CompositeWeights, SusceptibilityRaster};
pub use error::RasterError;
pub use factor::{FactorConfig, FactorKind, FactorLayer, FactorSet, FactorSources, build_factors};
pub use grid::{Crs, GridSpec, Raster};
pub use lookup::LookupTable;
pub use population::{PopulationMask, ZonePopulation, domain_area_km2, valid_area_km2};
pub use reduce::{Bounds, Reducer};
pub use resample::Resampling;
pub use zone::{Tertiles, Zone, ZoneCounts, ZoneRaster};
