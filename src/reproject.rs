//! # Reprojection to a Geographic Grid
//!
//! Resamples a [`ScanGrid`] from the geostationary fixed grid onto a regular
//! equirectangular latitude/longitude grid with bilinear interpolation, then
//! clips it to a bounding box.
//!
//! Output grids are north-up: rows run from the northernmost latitude
//! southwards, columns from the westernmost longitude eastwards. Coordinates
//! are cell centres.

use crate::error::{PipelineError, PipelineResult};
use crate::input::BoundingBox;
use crate::scan::{AxisUnits, ScanGrid};
use chrono::NaiveDateTime;
use ndarray::{Array2, Axis};

/// A field on a regular latitude/longitude grid at one instant.
#[derive(Debug, Clone)]
pub struct GeoGrid {
    /// Values indexed `(lat, lon)`; NaN where no data
    pub values: Array2<f32>,
    /// Latitude of each row, descending
    pub lats: Vec<f64>,
    /// Longitude of each column, ascending
    pub lons: Vec<f64>,
    /// Singleton time coordinate
    pub time: NaiveDateTime,
}

impl GeoGrid {
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Keeps the rows and columns whose coordinates fall inside `bbox`
    /// (bounds inclusive).
    pub fn clip_box(&self, bbox: &BoundingBox) -> PipelineResult<GeoGrid> {
        let rows: Vec<usize> = self
            .lats
            .iter()
            .enumerate()
            .filter(|(_, lat)| **lat >= bbox.min_lat && **lat <= bbox.max_lat)
            .map(|(i, _)| i)
            .collect();
        let cols: Vec<usize> = self
            .lons
            .iter()
            .enumerate()
            .filter(|(_, lon)| **lon >= bbox.min_lon && **lon <= bbox.max_lon)
            .map(|(j, _)| j)
            .collect();

        if rows.is_empty() || cols.is_empty() {
            return Err(PipelineError::EmptyGrid("clipping".to_string()));
        }

        Ok(GeoGrid {
            values: self.values.select(Axis(0), &rows).select(Axis(1), &cols),
            lats: rows.iter().map(|&i| self.lats[i]).collect(),
            lons: cols.iter().map(|&j| self.lons[j]).collect(),
            time: self.time,
        })
    }
}

/// Cell-centre coordinates of a regular grid covering `bbox` at `resolution`
/// degrees, as `(lats, lons)`.
pub fn target_axes(bbox: &BoundingBox, resolution: f64) -> (Vec<f64>, Vec<f64>) {
    let ncols = ((bbox.max_lon - bbox.min_lon) / resolution).round().max(1.0) as usize;
    let nrows = ((bbox.max_lat - bbox.min_lat) / resolution).round().max(1.0) as usize;

    let lons = (0..ncols)
        .map(|j| bbox.min_lon + (j as f64 + 0.5) * resolution)
        .collect();
    let lats = (0..nrows)
        .map(|i| bbox.max_lat - (i as f64 + 0.5) * resolution)
        .collect();
    (lats, lons)
}

/// Resamples `scan` onto a `resolution`-degree grid spanning `extent`.
///
/// Each destination cell centre is projected into the scan's fixed grid and
/// interpolated from the four surrounding source cells. NaN neighbours are
/// left out and the remaining weights renormalized. Cells outside the source
/// axes or beyond the Earth's limb stay NaN.
pub fn reproject_bilinear(
    scan: &ScanGrid,
    extent: &BoundingBox,
    resolution: f64,
) -> PipelineResult<GeoGrid> {
    let (ny, nx) = scan.shape();
    if ny < 2 || nx < 2 {
        return Err(PipelineError::EmptyGrid("reprojection".to_string()));
    }

    // Fixed-grid axes are compared in metres
    let to_metres = match scan.units {
        AxisUnits::Radians => scan.projection.perspective_point_height,
        AxisUnits::Metres => 1.0,
    };
    let xs: Vec<f64> = scan.x.iter().map(|v| v * to_metres).collect();
    let ys: Vec<f64> = scan.y.iter().map(|v| v * to_metres).collect();

    let (lats, lons) = target_axes(extent, resolution);
    let mut values = Array2::from_elem((lats.len(), lons.len()), f32::NAN);

    for (i, lat) in lats.iter().enumerate() {
        for (j, lon) in lons.iter().enumerate() {
            let Some((xm, ym)) = scan.projection.geo_to_metric(*lon, *lat) else {
                continue;
            };
            let (Some(fx), Some(fy)) = (axis_position(&xs, xm), axis_position(&ys, ym)) else {
                continue;
            };
            values[[i, j]] = bilinear(&scan.values, fy, fx);
        }
    }

    Ok(GeoGrid {
        values,
        lats,
        lons,
        time: scan.time,
    })
}

/// Fractional index of `value` along a monotonic axis, or `None` when it
/// lies outside the axis.
pub fn axis_position(axis: &[f64], value: f64) -> Option<f64> {
    let n = axis.len();
    if n < 2 || !value.is_finite() {
        return None;
    }
    let ascending = axis[n - 1] > axis[0];
    let (lo, hi) = if ascending {
        (axis[0], axis[n - 1])
    } else {
        (axis[n - 1], axis[0])
    };
    if value < lo || value > hi {
        return None;
    }

    // First index whose coordinate is past `value`
    let upper = if ascending {
        axis.partition_point(|&a| a <= value)
    } else {
        axis.partition_point(|&a| a >= value)
    };
    let k = upper.clamp(1, n - 1) - 1;
    let span = axis[k + 1] - axis[k];
    if span == 0.0 {
        return Some(k as f64);
    }
    Some(k as f64 + (value - axis[k]) / span)
}

fn bilinear(values: &Array2<f32>, fy: f64, fx: f64) -> f32 {
    let (ny, nx) = values.dim();
    let i0 = (fy.floor() as usize).min(ny - 1);
    let j0 = (fx.floor() as usize).min(nx - 1);
    let i1 = (i0 + 1).min(ny - 1);
    let j1 = (j0 + 1).min(nx - 1);
    let ty = fy - i0 as f64;
    let tx = fx - j0 as f64;

    let corners = [
        (values[[i0, j0]], (1.0 - ty) * (1.0 - tx)),
        (values[[i0, j1]], (1.0 - ty) * tx),
        (values[[i1, j0]], ty * (1.0 - tx)),
        (values[[i1, j1]], ty * tx),
    ];

    if corners.iter().all(|(v, _)| v.is_finite()) {
        let v = |k: usize| corners[k].0 as f64;
        let top = v(0) + (v(1) - v(0)) * tx;
        let bottom = v(2) + (v(3) - v(2)) * tx;
        return (top + (bottom - top) * ty) as f32;
    }

    // Weighted mean of the finite corners, taken relative to one of them so a
    // uniform neighbourhood interpolates to exactly that value.
    let finite: Vec<(f64, f64)> = corners
        .iter()
        .filter(|(v, w)| v.is_finite() && *w > 0.0)
        .map(|(v, w)| (*v as f64, *w))
        .collect();
    let Some(&(reference, _)) = finite.first() else {
        return f32::NAN;
    };
    let weight: f64 = finite.iter().map(|(_, w)| w).sum();
    let delta: f64 = finite.iter().map(|(v, w)| (v - reference) * w).sum();
    (reference + delta / weight) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::GeosProjection;
    use chrono::NaiveDate;
    use ndarray::array;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    /// Scan grid of `n`×`n` cells at `step` radians centred on a ground point.
    fn scan_around(lon: f64, lat: f64, n: usize, step: f64, fill: f32) -> ScanGrid {
        let projection = GeosProjection::goes18();
        let (x0, y0) = projection.geo_to_scan(lon, lat).unwrap();
        let half = (n as f64 - 1.0) / 2.0;
        ScanGrid {
            values: Array2::from_elem((n, n), fill),
            x: (0..n).map(|j| x0 + (j as f64 - half) * step).collect(),
            y: (0..n).map(|i| y0 - (i as f64 - half) * step).collect(),
            units: AxisUnits::Radians,
            projection,
            time: noon(),
        }
    }

    #[test]
    fn test_target_axes() {
        let bbox = BoundingBox {
            min_lon: -180.0,
            max_lon: -65.0,
            min_lat: 20.0,
            max_lat: 55.0,
        };
        let (lats, lons) = target_axes(&bbox, 0.05);
        assert_eq!(lats.len(), 700);
        assert_eq!(lons.len(), 2300);
        assert!((lats[0] - 54.975).abs() < 1e-9);
        assert!((lons[0] + 179.975).abs() < 1e-9);
        assert!(lats.windows(2).all(|w| w[0] > w[1]));
        assert!(lons.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_axis_position() {
        let asc = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(axis_position(&asc, 1.5), Some(1.5));
        assert_eq!(axis_position(&asc, 3.0), Some(3.0));
        assert_eq!(axis_position(&asc, 0.0), Some(0.0));
        assert_eq!(axis_position(&asc, -0.1), None);

        let desc = [3.0, 2.0, 1.0, 0.0];
        assert_eq!(axis_position(&desc, 2.5), Some(0.5));
        assert_eq!(axis_position(&desc, 0.0), Some(3.0));
        assert_eq!(axis_position(&desc, 3.5), None);

        // Irregular spacing after dropping lines
        let gaps = [0.0, 1.0, 4.0];
        assert_eq!(axis_position(&gaps, 2.5), Some(1.5));
    }

    #[test]
    fn test_bilinear_interpolates_gradient() {
        let values = array![[0.0f32, 10.0], [20.0, 30.0]];
        assert_eq!(bilinear(&values, 0.0, 0.0), 0.0);
        assert_eq!(bilinear(&values, 0.5, 0.5), 15.0);
        assert_eq!(bilinear(&values, 1.0, 1.0), 30.0);
        assert_eq!(bilinear(&values, 0.0, 0.5), 5.0);
    }

    #[test]
    fn test_bilinear_skips_missing_neighbours() {
        let nan = f32::NAN;
        let values = array![[7.0f32, nan], [7.0, 7.0]];
        assert_eq!(bilinear(&values, 0.3, 0.6), 7.0);

        let values = array![[nan, nan], [nan, nan]];
        assert!(bilinear(&values, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_reproject_constant_field() {
        let scan = scan_around(-120.0, 40.0, 21, 0.0005, 290.0);
        let extent = BoundingBox {
            min_lon: -125.0,
            max_lon: -115.0,
            min_lat: 35.0,
            max_lat: 45.0,
        };
        let grid = reproject_bilinear(&scan, &extent, 0.25).unwrap();

        assert_eq!(grid.shape(), (40, 40));
        assert_eq!(grid.time, noon());
        let finite: Vec<f32> = grid.values.iter().copied().filter(|v| v.is_finite()).collect();
        assert!(!finite.is_empty());
        assert!(finite.iter().all(|&v| v == 290.0));
        // The scan is much smaller than the extent, so the corners are empty
        assert!(grid.values[[0, 0]].is_nan());
    }

    #[test]
    fn test_reproject_metric_axes_match_radian_axes() {
        let scan = scan_around(-110.0, 35.0, 11, 0.002, 1.0);
        let mut metric = scan.clone();
        metric.to_metric();
        let extent = BoundingBox {
            min_lon: -115.0,
            max_lon: -105.0,
            min_lat: 30.0,
            max_lat: 40.0,
        };
        let a = reproject_bilinear(&scan, &extent, 0.5).unwrap();
        let b = reproject_bilinear(&metric, &extent, 0.5).unwrap();
        let finite_a = a.values.iter().filter(|v| v.is_finite()).count();
        let finite_b = b.values.iter().filter(|v| v.is_finite()).count();
        assert_eq!(finite_a, finite_b);
    }

    #[test]
    fn test_clip_box() {
        let grid = GeoGrid {
            values: Array2::from_shape_fn((4, 4), |(i, j)| (i * 4 + j) as f32),
            lats: vec![56.0, 50.0, 40.0, 19.0],
            lons: vec![-181.0, -100.0, -70.0, -60.0],
            time: noon(),
        };
        let bbox = BoundingBox::default();
        let clipped = grid.clip_box(&bbox).unwrap();
        assert_eq!(clipped.shape(), (2, 2));
        assert_eq!(clipped.lats, vec![50.0, 40.0]);
        assert_eq!(clipped.lons, vec![-100.0, -70.0]);
        assert_eq!(clipped.values[[0, 0]], 5.0);
        assert_eq!(clipped.values[[1, 1]], 10.0);
        assert_eq!(clipped.time, noon());
    }

    #[test]
    fn test_clip_box_empty() {
        let grid = GeoGrid {
            values: Array2::zeros((1, 1)),
            lats: vec![0.0],
            lons: vec![0.0],
            time: noon(),
        };
        assert!(matches!(
            grid.clip_box(&BoundingBox::default()),
            Err(PipelineError::EmptyGrid(_))
        ));
    }
}
