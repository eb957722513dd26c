//! # JSON Output Module
//!
//! Serializes daily aggregates and the run summary. Files are written
//! compactly through a buffered writer and replaced atomically, so a rerun
//! over the same inputs produces byte-identical files.
//!
//! ## Layout
//!
//! - `<output_dir>/<YYYY>_<DDD>_LST.json`: one [`DailyRecord`] per day
//! - `<output_dir>/daily_mean_LST_US.json`: list of [`DailyMean`]
//!
//! Day-of-year is always zero-padded to three digits.

use crate::error::PipelineResult;
use crate::reproject::GeoGrid;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the run summary
pub const SUMMARY_FILE: &str = "daily_mean_LST_US.json";

/// One finite grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "LST")]
    pub value: f64,
}

/// Per-day output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: String,
    pub data: Vec<GridPoint>,
}

/// Entry of the run summary. `mean` is `null` for a day without any
/// finite cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMean {
    pub date: String,
    #[serde(rename = "mean_LST")]
    pub mean: Option<f64>,
}

/// `YYYY-DDD` label used inside the documents
pub fn day_label(year: i32, jday: u32) -> String {
    format!("{}-{:03}", year, jday)
}

pub fn daily_file_name(year: i32, jday: u32) -> String {
    format!("{}_{:03}_LST.json", year, jday)
}

/// Writes `record` to `<output_dir>/<YYYY>_<DDD>_LST.json` and returns the path.
pub fn write_daily_record(
    output_dir: &Path,
    year: i32,
    jday: u32,
    record: &DailyRecord,
) -> PipelineResult<PathBuf> {
    let path = output_dir.join(daily_file_name(year, jday));
    write_json(&path, record)?;
    debug!("Wrote {} records to {}", record.data.len(), path.display());
    Ok(path)
}

/// Writes the summary list to `<output_dir>/daily_mean_LST_US.json`.
pub fn write_summary(output_dir: &Path, means: &[DailyMean]) -> PipelineResult<PathBuf> {
    let path = output_dir.join(SUMMARY_FILE);
    write_json(&path, means)?;
    debug!("Wrote summary of {} days to {}", means.len(), path.display());
    Ok(path)
}

/// Dumps a single reprojected scan: finite cells only, latitude-major.
pub fn write_scan_grid(path: &Path, grid: &GeoGrid) -> PipelineResult<()> {
    let mut data = Vec::new();
    for (i, &lat) in grid.lats.iter().enumerate() {
        for (j, &lon) in grid.lons.iter().enumerate() {
            let value = grid.values[[i, j]];
            if value.is_finite() {
                data.push(GridPoint {
                    lat,
                    lon,
                    value: value as f64,
                });
            }
        }
    }
    let record = DailyRecord {
        date: grid.time.format("%Y-%jT%H:%M:%S").to_string(),
        data,
    };
    write_json(path, &record)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> PipelineResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let temp = tempfile::NamedTempFile::new_in(&parent)?;
    let mut writer = BufWriter::new(temp);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    let temp = writer.into_inner().map_err(|e| e.into_error())?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_labels_pad_day() {
        assert_eq!(day_label(2024, 5), "2024-005");
        assert_eq!(daily_file_name(2024, 5), "2024_005_LST.json");
        assert_eq!(daily_file_name(2024, 215), "2024_215_LST.json");
    }

    #[test]
    fn test_daily_record_field_names() {
        let record = DailyRecord {
            date: day_label(2024, 15),
            data: vec![GridPoint {
                lat: 40.0,
                lon: -120.0,
                value: 290.5,
            }],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"date":"2024-015","data":[{"lat":40.0,"lon":-120.0,"LST":290.5}]}"#
        );
    }

    #[test]
    fn test_missing_mean_is_null() {
        let means = vec![
            DailyMean {
                date: "2024-001".to_string(),
                mean: Some(15.0),
            },
            DailyMean {
                date: "2024-002".to_string(),
                mean: None,
            },
        ];
        let json = serde_json::to_string(&means).unwrap();
        assert_eq!(
            json,
            r#"[{"date":"2024-001","mean_LST":15.0},{"date":"2024-002","mean_LST":null}]"#
        );
    }

    #[test]
    fn test_write_and_read_back() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let out = temp_dir.path().join("lib");

        let record = DailyRecord {
            date: day_label(2024, 15),
            data: Vec::new(),
        };
        let path = write_daily_record(&out, 2024, 15, &record)?;
        assert_eq!(path, out.join("2024_015_LST.json"));
        let back: DailyRecord = serde_json::from_slice(&std::fs::read(&path)?)?;
        assert_eq!(back, record);

        let summary = write_summary(&out, &[])?;
        assert_eq!(std::fs::read_to_string(summary)?, "[]");
        Ok(())
    }

    #[test]
    fn test_scan_grid_skips_missing() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("scan.json");
        let grid = GeoGrid {
            values: array![[1.0, f32::NAN], [2.0, 3.0]],
            lats: vec![41.0, 40.0],
            lons: vec![-121.0, -120.0],
            time: NaiveDate::from_yo_opt(2024, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        };
        write_scan_grid(&path, &grid)?;

        let back: DailyRecord = serde_json::from_slice(&std::fs::read(&path)?)?;
        assert_eq!(back.date, "2024-015T12:00:00");
        assert_eq!(back.data.len(), 3);
        assert_eq!(back.data[1], GridPoint { lat: 40.0, lon: -121.0, value: 2.0 });
        Ok(())
    }
}
