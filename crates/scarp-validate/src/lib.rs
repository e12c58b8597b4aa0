//! Validation of a susceptibility zonation against incident locations.
//!
//! Observed incidents and seeded synthetic points are sampled against a
//! zone raster; their zone histograms are compared with a chi-square
//! statistic and a High-zone confusion matrix, once over the whole domain
//! and once over populated pixels only. District statistics summarize the
//! surface and the incidents per administrative polygon.

pub mod confusion;
pub mod district;
pub mod error;
pub mod histogram;
pub mod point;
pub mod report;
pub mod sample;
pub mod study_area;

pub use confusion::{BinaryConfusion, BinaryMetrics};
pub use district::{District, DistrictStats, NationalStats, district_statistics};
pub use error::ValidationError;
pub use histogram::{CRITICAL_VALUES, ChiSquare, Significance, ZoneHistogram};
pub use point::{Incident, Origin, PointSet, SitePoint};
pub use report::{ComparisonReport, CriticalValue, Scope, ScopeInputs, ValidationReport, validate_both, validate_scope};
pub use sample::{Sample, SampleRecord, SampledSet, Sampler};
pub use study_area::{StudyArea, SyntheticConfig, oversample_factor, polygon_area_km2};
