//! # Daily Aggregation
//!
//! Folds the reprojected scans of one day along time, takes the per-cell
//! mean over finite values, and subsamples the result for output.

use crate::error::{PipelineError, PipelineResult};
use crate::output::GridPoint;
use crate::reproject::GeoGrid;
use chrono::NaiveDateTime;
use ndarray::{Array2, Zip, s};

/// Running time-stack of same-day grids.
///
/// Grids are folded in the order they are pushed; only per-cell sums and
/// counts of finite values are kept.
#[derive(Debug, Default)]
pub struct DayAccumulator {
    sum: Option<Array2<f64>>,
    count: Option<Array2<u32>>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    times: Vec<NaiveDateTime>,
}

impl DayAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of grids folded so far
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time coordinates in the order grids were pushed
    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    /// Adds one grid along the time axis.
    pub fn push(&mut self, grid: &GeoGrid) -> PipelineResult<()> {
        let shape = grid.shape();
        let (sum, count) = match (&mut self.sum, &mut self.count) {
            (Some(sum), Some(count)) => {
                if sum.dim() != shape {
                    return Err(PipelineError::ShapeMismatch {
                        expected: sum.dim(),
                        actual: shape,
                    });
                }
                (sum, count)
            }
            _ => {
                self.lats = grid.lats.clone();
                self.lons = grid.lons.clone();
                (
                    self.sum.insert(Array2::zeros(shape)),
                    self.count.insert(Array2::zeros(shape)),
                )
            }
        };

        Zip::from(sum)
            .and(count)
            .and(&grid.values)
            .for_each(|s, c, &v| {
                if v.is_finite() {
                    *s += v as f64;
                    *c += 1;
                }
            });
        self.times.push(grid.time);
        Ok(())
    }

    /// Time-mean of everything pushed, subsampled every `stride` cells.
    pub fn finish(self, stride: usize) -> PipelineResult<DailyAggregate> {
        let (Some(sum), Some(count)) = (self.sum, self.count) else {
            return Err(PipelineError::EmptyGrid("aggregation".to_string()));
        };
        let stride = stride.max(1);

        let mean = Zip::from(&sum).and(&count).map_collect(|&s, &c| {
            if c == 0 { f64::NAN } else { s / c as f64 }
        });

        let step = stride as isize;
        let values = mean.slice(s![..;step, ..;step]).to_owned();
        let lats = self.lats.iter().step_by(stride).copied().collect();
        let lons = self.lons.iter().step_by(stride).copied().collect();

        Ok(DailyAggregate {
            values,
            lats,
            lons,
            scans: self.times.len(),
        })
    }
}

/// Time-mean, subsampled grid of one day.
#[derive(Debug, Clone)]
pub struct DailyAggregate {
    /// Mean values indexed `(lat, lon)`; NaN where no scan had data
    pub values: Array2<f64>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    /// Number of scans that went into the mean
    pub scans: usize,
}

impl DailyAggregate {
    /// Number of coordinates visited when flattening, finite or not
    pub fn candidate_count(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    /// Finite cells as records, latitude-major.
    pub fn records(&self) -> Vec<GridPoint> {
        let mut points = Vec::new();
        for (i, &lat) in self.lats.iter().enumerate() {
            for (j, &lon) in self.lons.iter().enumerate() {
                let value = self.values[[i, j]];
                if value.is_finite() {
                    points.push(GridPoint { lat, lon, value });
                }
            }
        }
        points
    }

    /// Mean over all finite cells, or `None` when there are none
    pub fn spatial_mean(&self) -> Option<f64> {
        let (sum, n) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}
