//! Drainage factors derived from a flow-accumulation raster.

use rayon::prelude::*;
use tracing::warn;

use crate::grid::Raster;

/// 1 where accumulation exceeds `threshold`, 0 elsewhere, no-data preserved.
#[must_use]
pub fn stream_mask(flow_accumulation: &Raster, threshold: f64) -> Raster {
    flow_accumulation.map(|v| if v > threshold { 1.0 } else { 0.0 })
}

/// Fraction of stream cells inside a circular window of `radius_m` metres.
///
/// The window always includes the centre cell. No-data cells are left out of
/// both numerator and denominator.
#[must_use]
pub fn drainage_density(flow_accumulation: &Raster, threshold: f64, radius_m: f64) -> Raster {
    let streams = stream_mask(flow_accumulation, threshold);
    let spec = *streams.spec();
    let radius = (radius_m / spec.cell_size_m()).max(0.0);
    let reach = radius.floor() as isize;
    let offsets: Vec<(isize, isize)> = (-reach..=reach)
        .flat_map(|dr| (-reach..=reach).map(move |dc| (dr, dc)))
        .filter(|&(dr, dc)| ((dr * dr + dc * dc) as f64) <= radius * radius)
        .collect();
    let (rows, cols) = (spec.rows() as isize, spec.cols() as isize);

    let data: Vec<f64> = (0..spec.len())
        .into_par_iter()
        .map(|i| {
            if streams.get_index(i).is_none() {
                return f64::NAN;
            }
            let (r, c) = spec.row_col(i);
            let (mut sum, mut n) = (0.0, 0usize);
            for &(dr, dc) in &offsets {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                if nr < 0 || nc < 0 || nr >= rows || nc >= cols {
                    continue;
                }
                if let Some(v) = streams.get(nr as usize, nc as usize) {
                    sum += v;
                    n += 1;
                }
            }
            sum / n as f64
        })
        .collect();

    Raster::from_parts(spec, data)
}

/// Distance in metres from every valid pixel to the nearest stream pixel.
///
/// Two raster sweeps propagate the nearest stream cell seen by each
/// neighbour, which is exact up to rare 8-connected ties. Without any stream
/// cell the result is entirely no-data.
#[must_use]
pub fn distance_to_drainage(flow_accumulation: &Raster, threshold: f64) -> Raster {
    let streams = stream_mask(flow_accumulation, threshold);
    let spec = *streams.spec();
    let (rows, cols) = (spec.rows() as isize, spec.cols() as isize);

    let mut nearest: Vec<Option<(isize, isize)>> = (0..spec.len())
        .map(|i| {
            let (r, c) = spec.row_col(i);
            (streams.get_index(i) == Some(1.0)).then_some((r as isize, c as isize))
        })
        .collect();
    if nearest.iter().all(Option::is_none) {
        warn!(threshold, "no cell exceeds the stream threshold");
        return Raster::filled(spec, f64::NAN);
    }

    let dist2 = |r: isize, c: isize, seed: (isize, isize)| {
        let (dr, dc) = (r - seed.0, c - seed.1);
        dr * dr + dc * dc
    };
    let mut relax = |r: isize, c: isize, neighbours: &[(isize, isize)]| {
        let here = (r * cols + c) as usize;
        for &(dr, dc) in neighbours {
            let (nr, nc) = (r + dr, c + dc);
            if nr < 0 || nc < 0 || nr >= rows || nc >= cols {
                continue;
            }
            if let Some(seed) = nearest[(nr * cols + nc) as usize] {
                let better = match nearest[here] {
                    None => true,
                    Some(cur) => dist2(r, c, seed) < dist2(r, c, cur),
                };
                if better {
                    nearest[here] = Some(seed);
                }
            }
        }
    };

    const FORWARD: [(isize, isize); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];
    const BACKWARD: [(isize, isize); 4] = [(1, 1), (1, 0), (1, -1), (0, 1)];
    for r in 0..rows {
        for c in 0..cols {
            relax(r, c, &FORWARD);
        }
    }
    for r in (0..rows).rev() {
        for c in (0..cols).rev() {
            relax(r, c, &BACKWARD);
        }
    }

    let cellsize = spec.cell_size_m();
    Raster::from_fn(spec, |r, c| {
        let i = spec.index(r, c);
        match (streams.get_index(i), nearest[i]) {
            (Some(_), Some(seed)) => (dist2(r as isize, c as isize, seed) as f64).sqrt() * cellsize,
            _ => f64::NAN,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Crs, GridSpec};

    fn spec(rows: usize, cols: usize) -> GridSpec {
        GridSpec::new(rows, cols, 0.0, 0.0, 100.0, Crs::from_epsg(32645)).unwrap()
    }

    /// A single north-south stream down column 2.
    fn river(rows: usize, cols: usize) -> Raster {
        Raster::from_fn(spec(rows, cols), |_, c| if c == 2 { 500.0 } else { 3.0 })
    }

    #[test]
    fn stream_mask_thresholds_strictly() {
        let r = Raster::new(spec(1, 3), vec![50.0, 51.0, f64::NAN]).unwrap();
        let m = stream_mask(&r, 50.0);
        assert_eq!(m.get(0, 0), Some(0.0));
        assert_eq!(m.get(0, 1), Some(1.0));
        assert_eq!(m.get(0, 2), None);
    }

    #[test]
    fn density_is_a_fraction_peaking_on_the_stream() {
        let d = drainage_density(&river(7, 7), 50.0, 100.0);
        assert!(d.valid_values().all(|v| (0.0..=1.0).contains(&v)));
        let on = d.get(3, 2).unwrap();
        let off = d.get(3, 5).unwrap();
        assert!(on > off);
        assert_eq!(off, 0.0);
    }

    #[test]
    fn zero_radius_reduces_to_the_mask() {
        let d = drainage_density(&river(3, 5), 50.0, 0.0);
        assert_eq!(d.get(1, 2), Some(1.0));
        assert_eq!(d.get(1, 0), Some(0.0));
    }

    #[test]
    fn distance_grows_away_from_the_stream() {
        let d = distance_to_drainage(&river(5, 6), 50.0);
        assert_eq!(d.get(2, 2), Some(0.0));
        assert_eq!(d.get(2, 3), Some(100.0));
        assert_eq!(d.get(2, 5), Some(300.0));
        assert_eq!(d.get(0, 0), Some(200.0));
    }

    #[test]
    fn no_streams_gives_nodata() {
        let flat = Raster::filled(spec(3, 3), 1.0);
        assert_eq!(distance_to_drainage(&flat, 50.0).valid_count(), 0);
    }
}
