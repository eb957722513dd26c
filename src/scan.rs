//! # Satellite Scan Loading
//!
//! Reads one GOES ABI NetCDF file into a [`ScanGrid`]: the measured field on
//! its native fixed grid, the `x`/`y` axis coordinates, the geostationary
//! projection parameters and the scan time decoded from the file name.
//!
//! Packed integer fields are unpacked with `scale_factor`/`add_offset`
//! (signed storage flagged `_Unsigned` is read as unsigned first), and
//! `_FillValue` cells become NaN.

use crate::error::{PipelineError, PipelineResult};
use crate::projection::{GeosProjection, SweepAxis};
use crate::timestamp::parse_scan_time;
use chrono::NaiveDateTime;
use log::debug;
use ndarray::{Array2, Axis};
use std::path::Path;

/// Name of the grid-mapping variable in GOES ABI products
pub const PROJECTION_VARIABLE: &str = "goes_imager_projection";

/// Unit of the axis coordinates of a [`ScanGrid`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisUnits {
    Radians,
    Metres,
}

/// One scan of a single field on the satellite fixed grid.
#[derive(Debug, Clone)]
pub struct ScanGrid {
    /// Field values indexed `(y, x)`; no-data cells are NaN
    pub values: Array2<f32>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub units: AxisUnits,
    pub projection: GeosProjection,
    pub time: NaiveDateTime,
}

impl ScanGrid {
    /// Loads `variable` from a GOES NetCDF file.
    pub fn load<P: AsRef<Path>>(path: P, variable: &str) -> PipelineResult<Self> {
        let path = path.as_ref();
        let time = parse_scan_time(path)?;
        let file = netcdf::open(path)?;

        let var = file
            .variable(variable)
            .ok_or_else(|| PipelineError::MissingVariable(variable.to_string()))?;
        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name().to_string(), d.len()))
            .collect();
        if dims.len() != 2 {
            return Err(PipelineError::InvalidLayout {
                variable: variable.to_string(),
                reason: format!("expected 2 dimensions, found {}", dims.len()),
            });
        }
        let (ny, nx) = (dims[0].1, dims[1].1);

        let unpacked: Vec<f32> = read_unpacked(&var)?
            .into_iter()
            .map(|v| v as f32)
            .collect();
        let values = Array2::from_shape_vec((ny, nx), unpacked).map_err(|e| {
            PipelineError::InvalidLayout {
                variable: variable.to_string(),
                reason: e.to_string(),
            }
        })?;

        let x = read_axis(&file, &dims[1].0)?;
        let y = read_axis(&file, &dims[0].0)?;
        let projection = read_projection(&file)?;

        debug!(
            "Loaded {} {}x{} from {} ({})",
            variable,
            ny,
            nx,
            path.display(),
            projection.to_proj4()
        );

        let mut grid = ScanGrid {
            values,
            x,
            y,
            units: AxisUnits::Radians,
            projection,
            time,
        };
        grid.mask_non_finite();
        Ok(grid)
    }

    /// Shape as `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Marks every non-finite cell as NaN without changing the shape.
    pub fn mask_non_finite(&mut self) {
        self.values.mapv_inplace(|v| if v.is_finite() { v } else { f32::NAN });
    }

    /// Number of finite cells
    pub fn finite_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Converts both axes from scan angle to metres in place.
    pub fn to_metric(&mut self) {
        if self.units == AxisUnits::Metres {
            return;
        }
        let h = self.projection.perspective_point_height;
        self.x.iter_mut().for_each(|v| *v *= h);
        self.y.iter_mut().for_each(|v| *v *= h);
        self.units = AxisUnits::Metres;
    }

    /// Removes rows and columns that hold no finite cell.
    ///
    /// Unlike [`mask_non_finite`](Self::mask_non_finite) this changes the
    /// shape, and the remaining axes may no longer be evenly spaced.
    pub fn drop_empty_lines(&mut self) -> PipelineResult<()> {
        let keep_rows: Vec<usize> = self
            .values
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().any(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();
        let keep_cols: Vec<usize> = self
            .values
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| col.iter().any(|v| v.is_finite()))
            .map(|(j, _)| j)
            .collect();

        if keep_rows.is_empty() || keep_cols.is_empty() {
            return Err(PipelineError::EmptyGrid("masking".to_string()));
        }

        self.values = self
            .values
            .select(Axis(0), &keep_rows)
            .select(Axis(1), &keep_cols);
        self.y = keep_rows.iter().map(|&i| self.y[i]).collect();
        self.x = keep_cols.iter().map(|&j| self.x[j]).collect();
        Ok(())
    }
}

fn read_axis(file: &netcdf::File, name: &str) -> PipelineResult<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| PipelineError::MissingVariable(name.to_string()))?;
    read_unpacked(&var)
}

/// Reads a variable as `f64`, honouring `_Unsigned`, `_FillValue`,
/// `scale_factor` and `add_offset`. Fill cells become NaN.
fn read_unpacked(var: &netcdf::Variable) -> PipelineResult<Vec<f64>> {
    let raw: Vec<f64> = var.get_values::<f64, _>(..)?;
    let wrap_bits = unsigned_bits(var);
    let as_stored = |v: f64| match wrap_bits {
        Some(bits) if v < 0.0 => v + 2f64.powi(bits),
        _ => v,
    };

    let fill = get_f64_attr(var, "_FillValue").map(as_stored);
    let scale = get_f64_attr(var, "scale_factor").unwrap_or(1.0);
    let offset = get_f64_attr(var, "add_offset").unwrap_or(0.0);
    Ok(raw
        .into_iter()
        .map(as_stored)
        .map(|v| match fill {
            Some(f) if v == f => f64::NAN,
            _ => v * scale + offset,
        })
        .collect())
}

/// Width of a signed integer variable flagged `_Unsigned = "true"`.
///
/// netCDF-3 has no unsigned shorts, so GOES stores them signed with this flag
/// and negative raw values wrap around to the upper half of the range.
fn unsigned_bits(var: &netcdf::Variable) -> Option<i32> {
    use netcdf::types::{IntType, NcVariableType};

    let flagged = get_string_attr(var, "_Unsigned")
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("true"));
    if !flagged {
        return None;
    }
    match var.vartype() {
        NcVariableType::Int(IntType::I8) => Some(8),
        NcVariableType::Int(IntType::I16) => Some(16),
        NcVariableType::Int(IntType::I32) => Some(32),
        _ => None,
    }
}

fn read_projection(file: &netcdf::File) -> PipelineResult<GeosProjection> {
    let var = file
        .variable(PROJECTION_VARIABLE)
        .ok_or_else(|| PipelineError::MissingVariable(PROJECTION_VARIABLE.to_string()))?;

    let required = |name: &str| {
        get_f64_attr(&var, name).ok_or_else(|| PipelineError::MissingAttribute {
            variable: PROJECTION_VARIABLE.to_string(),
            attribute: name.to_string(),
        })
    };

    let sweep = get_string_attr(&var, "sweep_angle_axis").ok_or_else(|| {
        PipelineError::MissingAttribute {
            variable: PROJECTION_VARIABLE.to_string(),
            attribute: "sweep_angle_axis".to_string(),
        }
    })?;
    let sweep_angle_axis = sweep
        .parse::<SweepAxis>()
        .map_err(|reason| PipelineError::InvalidLayout {
            variable: PROJECTION_VARIABLE.to_string(),
            reason,
        })?;

    Ok(GeosProjection {
        perspective_point_height: required("perspective_point_height")?,
        longitude_of_projection_origin: required("longitude_of_projection_origin")?,
        sweep_angle_axis,
        semi_major_axis: required("semi_major_axis")?,
        semi_minor_axis: required("semi_minor_axis")?,
    })
}

// Checking first keeps HDF5 from printing errors for absent attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        netcdf::AttributeValue::Strs(mut s) if !s.is_empty() => Some(s.swap_remove(0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn grid(values: Array2<f32>) -> ScanGrid {
        let (ny, nx) = values.dim();
        ScanGrid {
            values,
            x: (0..nx).map(|j| j as f64 * 1e-3).collect(),
            y: (0..ny).map(|i| 0.1 - i as f64 * 1e-3).collect(),
            units: AxisUnits::Radians,
            projection: GeosProjection::goes18(),
            time: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_mask_keeps_shape() {
        let mut g = grid(array![[1.0, f32::INFINITY], [f32::NEG_INFINITY, 4.0]]);
        g.mask_non_finite();
        assert_eq!(g.shape(), (2, 2));
        assert!(g.values[[0, 1]].is_nan());
        assert!(g.values[[1, 0]].is_nan());
        assert_eq!(g.finite_count(), 2);
    }

    #[test]
    fn test_to_metric_scales_axes_once() {
        let mut g = grid(array![[1.0, 2.0], [3.0, 4.0]]);
        g.to_metric();
        g.to_metric();
        assert_eq!(g.units, AxisUnits::Metres);
        assert_eq!(g.x[1], 1e-3 * 35786023.0);
        assert_eq!(g.y[0], 0.1 * 35786023.0);
    }

    #[test]
    fn test_drop_empty_lines() {
        let nan = f32::NAN;
        let mut g = grid(array![
            [nan, nan, nan, nan],
            [nan, 1.0, nan, 2.0],
            [nan, nan, nan, nan],
            [nan, 3.0, nan, nan],
        ]);
        let y_before = g.y.clone();
        let x_before = g.x.clone();

        g.drop_empty_lines().unwrap();

        assert_eq!(g.shape(), (2, 2));
        assert_eq!(g.y, vec![y_before[1], y_before[3]]);
        assert_eq!(g.x, vec![x_before[1], x_before[3]]);
        assert_eq!(g.values[[0, 0]], 1.0);
        assert_eq!(g.values[[0, 1]], 2.0);
        assert_eq!(g.values[[1, 0]], 3.0);
        assert!(g.values[[1, 1]].is_nan());
    }

    #[test]
    fn test_drop_empty_lines_all_missing() {
        let mut g = grid(Array2::from_elem((3, 3), f32::NAN));
        assert!(matches!(g.drop_empty_lines(), Err(PipelineError::EmptyGrid(_))));
    }
}
