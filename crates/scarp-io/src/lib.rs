//! File readers and result writers for the scarp pipeline.
//!
//! Rasters travel as ESRI ASCII grids, boundaries as GeoJSON polygons and
//! incidents as CSV. Results are written as JSON artifacts and ASCII grids
//! named after the experiment.

mod boundary;
mod domain;
mod error;
mod incident_reader;
mod reader;
mod writer;

pub use boundary::BoundaryReader;
pub use domain::{ExperimentName, MAX_EXPERIMENT_NAME_LEN};
pub use error::IoError;
pub use incident_reader::IncidentReader;
pub use reader::RasterReader;
pub use writer::{ASCII_NODATA, ResultWriter, write_ascii_grid};
