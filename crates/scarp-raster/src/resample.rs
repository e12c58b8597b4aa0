//! Resampling onto a target grid in the same CRS.

use rayon::prelude::*;
use tracing::debug;

use crate::error::RasterError;
use crate::grid::{GridSpec, Raster};

/// How source pixels are combined into a target cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    /// Value of the source pixel under the target cell centre.
    Nearest,
    /// Mean of the valid source pixels whose centres fall in the target cell.
    Mean,
    /// Areal sum: each source pixel's value is split over the target cells
    /// its footprint overlaps, in proportion to the overlapping area. Counts
    /// inside the target extent are conserved whether the source is finer or
    /// coarser than the target. Cells without a valid contributor hold 0.
    Sum,
}

impl Raster {
    /// Resample onto `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::CrsMismatch`] when `target` uses another CRS.
    pub fn resample(&self, target: &GridSpec, method: Resampling) -> Result<Raster, RasterError> {
        let spec = self.spec();
        if spec.crs() != target.crs() {
            return Err(RasterError::CrsMismatch {
                from: spec.crs(),
                to: target.crs(),
            });
        }
        if spec.same_grid(target) {
            return Ok(self.clone());
        }
        debug!(from = %spec, to = %target, ?method, "resampling raster");

        let data = match method {
            Resampling::Nearest => (0..target.len())
                .into_par_iter()
                .map(|i| {
                    let (r, c) = target.row_col(i);
                    let (x, y) = target.cell_center(r, c);
                    self.value_at(x, y).unwrap_or(f64::NAN)
                })
                .collect(),
            Resampling::Sum => areal_sum(self, target),
            Resampling::Mean => {
                let mut sums = vec![0.0; target.len()];
                let mut counts = vec![0usize; target.len()];
                for i in 0..spec.len() {
                    let Some(v) = self.get_index(i) else {
                        continue;
                    };
                    let (r, c) = spec.row_col(i);
                    let (x, y) = spec.cell_center(r, c);
                    if let Some((tr, tc)) = target.cell_of(x, y) {
                        let t = target.index(tr, tc);
                        sums[t] += v;
                        counts[t] += 1;
                    }
                }
                sums.into_iter()
                    .zip(counts)
                    .map(|(sum, n)| if n == 0 { f64::NAN } else { sum / n as f64 })
                    .collect()
            }
        };
        Raster::new(*target, data)
    }
}

/// Half-open range of target indices whose cells overlap `[lo, hi)`, where
/// `offset` is the coordinate distance from the target's first edge.
fn overlapping(lo_offset: f64, hi_offset: f64, cell: f64, n: usize) -> std::ops::Range<usize> {
    let start = (lo_offset / cell).floor().max(0.0) as usize;
    let end = ((hi_offset / cell).ceil().max(0.0) as usize).min(n);
    start.min(end)..end
}

fn areal_sum(source: &Raster, target: &GridSpec) -> Vec<f64> {
    let spec = source.spec();
    let (cs, tcs) = (spec.cell_size(), target.cell_size());
    let source_area = cs * cs;
    let mut sums = vec![0.0; target.len()];
    for i in 0..spec.len() {
        let Some(v) = source.get_index(i) else {
            continue;
        };
        let (r, c) = spec.row_col(i);
        let x0 = spec.west() + c as f64 * cs;
        let x1 = x0 + cs;
        let y1 = spec.north() - r as f64 * cs;
        let y0 = y1 - cs;

        let rows = overlapping(target.north() - y1, target.north() - y0, tcs, target.rows());
        let cols = overlapping(x0 - target.west(), x1 - target.west(), tcs, target.cols());
        for tr in rows {
            let ty1 = target.north() - tr as f64 * tcs;
            let dy = y1.min(ty1) - y0.max(ty1 - tcs);
            if dy <= 0.0 {
                continue;
            }
            for tc in cols.clone() {
                let tx0 = target.west() + tc as f64 * tcs;
                let dx = x1.min(tx0 + tcs) - x0.max(tx0);
                if dx > 0.0 {
                    sums[target.index(tr, tc)] += v * dx * dy / source_area;
                }
            }
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Crs;

    fn fine() -> Raster {
        let spec = GridSpec::new(4, 4, 0.0, 4.0, 1.0, Crs::from_epsg(32645)).unwrap();
        Raster::from_fn(spec, |r, c| (r * 4 + c) as f64)
    }

    #[test]
    fn sum_conserves_counts() {
        let src = fine();
        let target = src.spec().with_cell_size(2.0).unwrap();
        let out = src.resample(&target, Resampling::Sum).unwrap();
        let before: f64 = src.valid_values().sum();
        let after: f64 = out.valid_values().sum();
        assert!((before - after).abs() < 1e-9);
        assert_eq!(out.get(0, 0), Some(0.0 + 1.0 + 4.0 + 5.0));
    }

    #[test]
    fn sum_spreads_a_coarse_cell_over_its_footprint() {
        // one 1000 m cell of 500 people onto a 100 m grid
        let coarse = GridSpec::new(1, 1, 0.0, 1000.0, 1000.0, Crs::from_epsg(32645)).unwrap();
        let src = Raster::new(coarse, vec![500.0]).unwrap();
        let fine = GridSpec::new(10, 10, 0.0, 1000.0, 100.0, Crs::from_epsg(32645)).unwrap();
        let out = src.resample(&fine, Resampling::Sum).unwrap();
        assert_eq!(out.valid_count(), 100);
        for v in out.valid_values() {
            assert!((v - 5.0).abs() < 1e-9, "{v}");
        }
        assert!((out.valid_values().sum::<f64>() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn sum_splits_misaligned_cells_by_overlap() {
        // a 2 m cell straddling 1.5 m target rows and columns
        let spec = GridSpec::new(1, 1, 0.0, 2.0, 2.0, Crs::from_epsg(32645)).unwrap();
        let src = Raster::new(spec, vec![8.0]).unwrap();
        let target = GridSpec::new(2, 2, 0.0, 2.0, 1.5, Crs::from_epsg(32645)).unwrap();
        let out = src.resample(&target, Resampling::Sum).unwrap();
        let total: f64 = out.valid_values().sum();
        assert!((total - 8.0).abs() < 1e-9);
        // top-left target cell covers 1.5 × 1.5 of the 4 m² source
        assert!((out.get(0, 0).unwrap() - 8.0 * 2.25 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn sum_treats_missing_coverage_as_zero() {
        let spec = GridSpec::new(2, 2, 0.0, 2.0, 1.0, Crs::from_epsg(32645)).unwrap();
        let src = Raster::new(spec, vec![f64::NAN; 4]).unwrap();
        let target = spec.with_cell_size(2.0).unwrap();
        let out = src.resample(&target, Resampling::Sum).unwrap();
        assert_eq!(out.get(0, 0), Some(0.0));
    }

    #[test]
    fn mean_of_empty_cell_is_nodata() {
        let spec = GridSpec::new(2, 2, 0.0, 2.0, 1.0, Crs::from_epsg(32645)).unwrap();
        let src = Raster::new(spec, vec![f64::NAN; 4]).unwrap();
        let target = spec.with_cell_size(2.0).unwrap();
        assert_eq!(src.resample(&target, Resampling::Mean).unwrap().get(0, 0), None);
    }

    #[test]
    fn nearest_upsamples_by_repetition() {
        let src = fine();
        let target = src.spec().with_cell_size(0.5).unwrap();
        let out = src.resample(&target, Resampling::Nearest).unwrap();
        assert_eq!(out.get(0, 0), Some(0.0));
        assert_eq!(out.get(1, 1), Some(0.0));
        assert_eq!(out.get(7, 7), Some(15.0));
    }

    #[test]
    fn crs_mismatch_is_an_error() {
        let src = fine();
        let target = GridSpec::new(2, 2, 0.0, 4.0, 2.0, Crs::WGS84).unwrap();
        assert!(matches!(
            src.resample(&target, Resampling::Nearest),
            Err(RasterError::CrsMismatch { .. })
        ));
    }
}
