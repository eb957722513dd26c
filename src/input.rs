//! # Input Configuration Module
//!
//! Configuration parsing and validation for goes2json runs. A configuration
//! names the object store to read from, the product and year, the day range,
//! the cache and output directories, and the geographic grid scans are
//! resampled onto. Every field has a default, so an empty document is a
//! valid configuration for the January 2024 GOES-18 LST run.
//!
//! ## Example Usage
//!
//! ```rust
//! use goes2json::input::{EmptyPolicy, PipelineConfig};
//!
//! let json = r#"
//! {
//!   "product": "ABI-L2-LSTF",
//!   "year": 2024,
//!   "first_day": 15,
//!   "last_day": 20,
//!   "on_empty": "fail"
//! }"#;
//! let config = PipelineConfig::from_json(json)?;
//! assert_eq!(config.days().count(), 6);
//! assert_eq!(config.on_empty, EmptyPolicy::Fail);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{PipelineError, PipelineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Default for BoundingBox {
    /// Contiguous United States and surroundings
    fn default() -> Self {
        Self {
            min_lon: -180.0,
            max_lon: -65.0,
            min_lat: 20.0,
            max_lat: 55.0,
        }
    }
}

impl BoundingBox {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// What to do when a day has no remote objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPolicy {
    /// Log and continue with the next day
    #[default]
    Skip,
    /// Abort the run
    Fail,
}

/// How a cached file is judged usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheValidation {
    /// Any existing file is a cache hit
    #[default]
    Exists,
    /// The local size must equal the remote size when the store reports one
    Size,
}

/// Cache behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub validation: CacheValidation,
    /// Extra download attempts after a failed one
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with the attempt number
    pub retry_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            validation: CacheValidation::Exists,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

/// Pause policy applied after each processed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThrottleConfig {
    None,
    Fixed { delay_ms: u64 },
    TokenBucket { capacity: u32, refill_per_sec: f64 },
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig::Fixed { delay_ms: 1000 }
    }
}

/// Complete configuration of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `s3://bucket` for the public archive, or a local directory laid out
    /// like the bucket
    pub source: String,
    /// AWS region of the bucket
    pub region: String,
    /// Product directory in the bucket, e.g. `ABI-L2-LSTF`
    pub product: String,
    /// NetCDF variable holding the measured field
    pub variable: String,
    pub year: i32,
    /// First day-of-year processed (1-based, inclusive)
    pub first_day: u32,
    /// Last day-of-year processed (inclusive)
    pub last_day: u32,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub bbox: BoundingBox,
    /// Target grid spacing in degrees
    pub resolution: f64,
    /// Spatial subsampling step of the daily aggregate
    pub stride: usize,
    pub on_empty: EmptyPolicy,
    pub cache: CacheConfig,
    pub throttle: ThrottleConfig,
    /// Show a progress bar over days
    pub progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: "s3://noaa-goes18".to_string(),
            region: "us-east-1".to_string(),
            product: "ABI-L2-LSTF".to_string(),
            variable: "LST".to_string(),
            year: 2024,
            first_day: 1,
            last_day: 31,
            cache_dir: PathBuf::from("./cache_datasets"),
            output_dir: PathBuf::from("./lib"),
            bbox: BoundingBox::default(),
            resolution: 0.05,
            stride: 4,
            on_empty: EmptyPolicy::Skip,
            cache: CacheConfig::default(),
            throttle: ThrottleConfig::default(),
            progress: true,
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration from a JSON or YAML file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, anything else
    /// as JSON. The result is validated before it is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json_str: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML configuration.
    pub fn from_yaml(yaml_str: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml_str)
            .map_err(|e| PipelineError::Config(format!("YAML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Days-of-year covered by this run
    pub fn days(&self) -> RangeInclusive<u32> {
        self.first_day..=self.last_day
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> PipelineResult<()> {
        let days_in_year = days_in_year(self.year)
            .ok_or_else(|| PipelineError::Config(format!("invalid year {}", self.year)))?;

        if self.first_day == 0 || self.last_day > days_in_year {
            return Err(PipelineError::Config(format!(
                "day range {}-{} must lie within 1-{} for {}",
                self.first_day, self.last_day, days_in_year, self.year
            )));
        }
        if self.first_day > self.last_day {
            return Err(PipelineError::Config(format!(
                "first day {} is after last day {}",
                self.first_day, self.last_day
            )));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(PipelineError::Config(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.stride == 0 {
            return Err(PipelineError::Config("stride must be at least 1".to_string()));
        }
        let b = &self.bbox;
        if !(b.min_lon < b.max_lon && b.min_lat < b.max_lat) {
            return Err(PipelineError::Config(format!(
                "bounding box is empty: lon {}..{}, lat {}..{}",
                b.min_lon, b.max_lon, b.min_lat, b.max_lat
            )));
        }
        if self.product.is_empty() || self.variable.is_empty() {
            return Err(PipelineError::Config(
                "product and variable must not be empty".to_string(),
            ));
        }
        if let ThrottleConfig::TokenBucket {
            capacity,
            refill_per_sec,
        } = self.throttle
            && (capacity == 0 || !(refill_per_sec > 0.0))
        {
            return Err(PipelineError::Config(
                "token bucket needs a positive capacity and refill rate".to_string(),
            ));
        }
        Ok(())
    }
}

fn days_in_year(year: i32) -> Option<u32> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
    Some((next - start).num_days() as u32)
}
