//! # goes2json
//!
//! A Rust library that turns GOES-18 ABI land surface temperature scans into
//! daily JSON maps of the United States.
//!
//! ## Features
//!
//! - **Object store sources**: anonymous access to the public NOAA S3 bucket,
//!   or a local directory with the same layout
//! - **Download cache**: scans are fetched once and reused on later runs
//! - **Geostationary reprojection**: bilinear resampling from the fixed grid
//!   onto a regular latitude/longitude grid
//! - **Daily aggregation**: skip-missing time mean, spatial subsampling and
//!   a summary of daily means
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use goes2json::{run_pipeline, input::PipelineConfig, storage::StorageFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::from_file("goes.yaml")?;
//! let store = StorageFactory::from_uri(&config.source, &config.region).await?;
//! let summary = run_pipeline(&config, &store).await?;
//! println!("{} days written", summary.days_processed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "source": "s3://noaa-goes18",
//!   "product": "ABI-L2-LSTF",
//!   "year": 2024,
//!   "first_day": 1,
//!   "last_day": 31,
//!   "cache_dir": "./cache_datasets",
//!   "output_dir": "./lib",
//!   "throttle": { "kind": "fixed", "delay_ms": 1000 }
//! }
//! ```

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod enumerate;
pub mod error;
pub mod input;
pub mod log;
pub mod output;
pub mod pipeline;
pub mod projection;
pub mod reproject;
pub mod scan;
pub mod storage;
pub mod throttle;
pub mod timestamp;


pub use error::{PipelineError, PipelineResult};
pub use pipeline::{RunSummary, run_pipeline, run_single_scan, transform_scan};
