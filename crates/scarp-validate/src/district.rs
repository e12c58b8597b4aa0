//! Per-district susceptibility and incident statistics.

use geo::{BoundingRect, Contains, Point, Polygon};
use rayon::prelude::*;
use scarp_raster::reduce::mean_std;
use scarp_raster::{GridSpec, Raster, Zone, ZoneCounts, ZoneRaster};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::ValidationError;
use crate::point::PointSet;
use crate::study_area::polygon_area_km2;

/// A named administrative polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub name: String,
    pub polygon: Polygon<f64>,
}

/// Statistics of one district.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictStats {
    pub name: String,
    pub area_km2: f64,
    pub valid_pixels: usize,
    pub mean_susceptibility: Option<f64>,
    pub std_susceptibility: Option<f64>,
    /// Share of the district's valid pixels in the High zone.
    pub high_risk_proportion: Option<f64>,
    /// District mean over national mean.
    pub relative_risk: Option<f64>,
    pub incidents: usize,
    pub deaths: u64,
    pub injured: u64,
    pub infrastructure_destroyed: u64,
    pub incidents_per_km2: f64,
    pub deaths_per_km2: f64,
    pub injured_per_km2: f64,
    pub infrastructure_per_km2: f64,
}

/// National reference values shared by every district.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NationalStats {
    pub mean_susceptibility: Option<f64>,
    pub districts: usize,
    pub total_incidents: usize,
    pub total_deaths: u64,
    pub total_injured: u64,
    pub total_infrastructure_destroyed: u64,
    /// Means of the per-district rates.
    pub mean_incidents_per_km2: f64,
    pub mean_deaths_per_km2: f64,
    pub mean_injured_per_km2: f64,
    pub mean_infrastructure_per_km2: f64,
}

impl NationalStats {
    /// National mean over every valid pixel, totals and mean rates over
    /// `districts`.
    #[must_use]
    pub fn compute(susceptibility: &Raster, districts: &[DistrictStats]) -> Self {
        let values: Vec<f64> = susceptibility.valid_values().collect();
        let n = districts.len();
        let mean_of = |f: fn(&DistrictStats) -> f64| {
            if n == 0 {
                0.0
            } else {
                districts.iter().map(f).sum::<f64>() / n as f64
            }
        };
        Self {
            mean_susceptibility: mean_std(&values).map(|(m, _)| m),
            districts: n,
            total_incidents: districts.iter().map(|d| d.incidents).sum(),
            total_deaths: districts.iter().map(|d| d.deaths).sum(),
            total_injured: districts.iter().map(|d| d.injured).sum(),
            total_infrastructure_destroyed: districts.iter().map(|d| d.infrastructure_destroyed).sum(),
            mean_incidents_per_km2: mean_of(|d| d.incidents_per_km2),
            mean_deaths_per_km2: mean_of(|d| d.deaths_per_km2),
            mean_injured_per_km2: mean_of(|d| d.injured_per_km2),
            mean_infrastructure_per_km2: mean_of(|d| d.infrastructure_per_km2),
        }
    }

    /// `district_mean / national mean`, undefined for a zero national mean.
    #[must_use]
    pub fn relative_risk(&self, district_mean: Option<f64>) -> Option<f64> {
        let national = self.mean_susceptibility.filter(|&m| m > 0.0)?;
        district_mean.map(|d| d / national)
    }
}

/// Statistics for every district plus the national reference.
///
/// # Errors
///
/// Returns [`ValidationError::Raster`] when `susceptibility` and `zones` are
/// on different grids.
#[instrument(skip_all, fields(districts = districts.len()))]
pub fn district_statistics(
    districts: &[District],
    susceptibility: &Raster,
    zones: &ZoneRaster,
    incidents: &PointSet,
) -> Result<(Vec<DistrictStats>, NationalStats), ValidationError> {
    susceptibility.spec().ensure_same(zones.spec())?;
    let mut stats: Vec<DistrictStats> = districts
        .par_iter()
        .map(|d| summarize(d, susceptibility, zones, incidents))
        .collect();
    let national = NationalStats::compute(susceptibility, &stats);
    for s in &mut stats {
        s.relative_risk = national.relative_risk(s.mean_susceptibility);
    }
    info!(
        national_mean = ?national.mean_susceptibility,
        incidents = national.total_incidents,
        "district statistics complete"
    );
    Ok((stats, national))
}

fn summarize(
    district: &District,
    susceptibility: &Raster,
    zones: &ZoneRaster,
    incidents: &PointSet,
) -> DistrictStats {
    let spec = susceptibility.spec();
    let mut values = Vec::new();
    let mut zone_counts = ZoneCounts::default();
    for i in cells_within(&district.polygon, spec) {
        if let Some(v) = susceptibility.get_index(i) {
            values.push(v);
        }
        if let Some(z) = zones.get_index(i) {
            zone_counts.add(z);
        }
    }
    let moments = mean_std(&values);

    let inside: Vec<_> = incidents
        .incidents()
        .filter(|i| district.polygon.contains(&i.location()))
        .collect();
    let deaths: u64 = inside.iter().map(|i| u64::from(i.deaths)).sum();
    let injured: u64 = inside.iter().map(|i| u64::from(i.injured)).sum();
    let infrastructure: u64 = inside.iter().map(|i| u64::from(i.infrastructure_destroyed)).sum();

    let area_km2 = polygon_area_km2(&district.polygon, spec.crs());
    let per_km2 = |count: f64| if area_km2 > 0.0 { count / area_km2 } else { 0.0 };
    DistrictStats {
        name: district.name.clone(),
        area_km2,
        valid_pixels: values.len(),
        mean_susceptibility: moments.map(|(m, _)| m),
        std_susceptibility: moments.map(|(_, s)| s),
        high_risk_proportion: (zone_counts.total() > 0).then(|| zone_counts.fraction(Zone::High)),
        relative_risk: None,
        incidents: inside.len(),
        deaths,
        injured,
        infrastructure_destroyed: infrastructure,
        incidents_per_km2: per_km2(inside.len() as f64),
        deaths_per_km2: per_km2(deaths as f64),
        injured_per_km2: per_km2(injured as f64),
        infrastructure_per_km2: per_km2(infrastructure as f64),
    }
}

/// Indices of the cells whose centre lies inside `polygon`.
fn cells_within(polygon: &Polygon<f64>, spec: &GridSpec) -> Vec<usize> {
    let Some(bbox) = polygon.bounding_rect() else {
        return Vec::new();
    };
    let cs = spec.cell_size();
    let clamp_row = |y: f64| (((spec.north() - y) / cs).max(0.0) as usize).min(spec.rows());
    let clamp_col = |x: f64| (((x - spec.west()) / cs).max(0.0) as usize).min(spec.cols());
    let (r0, r1) = (clamp_row(bbox.max().y), (clamp_row(bbox.min().y) + 1).min(spec.rows()));
    let (c0, c1) = (clamp_col(bbox.min().x), (clamp_col(bbox.max().x) + 1).min(spec.cols()));
    let mut cells = Vec::new();
    for r in r0..r1 {
        for c in c0..c1 {
            let (x, y) = spec.cell_center(r, c);
            if polygon.contains(&Point::new(x, y)) {
                cells.push(spec.index(r, c));
            }
        }
    }
    cells
}
