//! Slope from elevation using the Horn (1981) 3×3 gradient.

use rayon::prelude::*;

use crate::grid::Raster;

/// Slope in degrees for every valid elevation pixel.
///
/// Neighbours outside the grid or without data take the centre value, so
/// edges and holes flatten the gradient instead of poisoning it. Cell size
/// comes from [`crate::GridSpec::cell_size_m`], which keeps geographic grids
/// in consistent units with the elevation metres.
#[must_use]
pub fn slope_degrees(elevation: &Raster) -> Raster {
    let spec = *elevation.spec();
    let cellsize = spec.cell_size_m();
    let (rows, cols) = (spec.rows() as isize, spec.cols() as isize);

    let data: Vec<f64> = (0..spec.len())
        .into_par_iter()
        .map(|i| {
            let (r, c) = spec.row_col(i);
            let Some(z) = elevation.get_index(i) else {
                return f64::NAN;
            };
            let at = |dr: isize, dc: isize| -> f64 {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                if nr < 0 || nc < 0 || nr >= rows || nc >= cols {
                    return z;
                }
                elevation.get(nr as usize, nc as usize).unwrap_or(z)
            };

            let (nw, n, ne) = (at(-1, -1), at(-1, 0), at(-1, 1));
            let (w, e) = (at(0, -1), at(0, 1));
            let (sw, s, se) = (at(1, -1), at(1, 0), at(1, 1));

            let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) / (8.0 * cellsize);
            let dz_dy = ((nw + 2.0 * n + ne) - (sw + 2.0 * s + se)) / (8.0 * cellsize);
            dz_dx.hypot(dz_dy).atan().to_degrees()
        })
        .collect();

    Raster::from_parts(spec, data)
}
