//! # Pipeline Orchestration
//!
//! Drives the two flows over an object store:
//!
//! - [`run_pipeline`]: every day of the configured range is enumerated,
//!   fetched into the cache, reprojected scan by scan and folded into a
//!   daily aggregate, then written as JSON together with a summary of
//!   daily means.
//! - [`run_single_scan`]: the first scan of one day is fetched, trimmed of
//!   empty rows and columns, reprojected and optionally dumped as JSON.
//!
//! Days and files are handled one at a time. The CPU-bound transform runs
//! on the blocking pool and is awaited before the next file is fetched.

use crate::aggregate::DayAccumulator;
use crate::cache::{FetchOutcome, cache_path, fetch_cached};
use crate::enumerate::{day_prefix, list_day_objects};
use crate::error::{PipelineError, PipelineResult};
use crate::input::{BoundingBox, EmptyPolicy, PipelineConfig};
use crate::output::{
    DailyMean, DailyRecord, day_label, write_daily_record, write_scan_grid, write_summary,
};
use crate::reproject::{GeoGrid, reproject_bilinear};
use crate::scan::ScanGrid;
use crate::storage::{ObjectEntry, StorageBackend};
use crate::throttle::Throttle;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// What a [`run_pipeline`] call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// One entry per day that produced output, in day order
    pub means: Vec<DailyMean>,
    /// Days without any scan, skipped under [`EmptyPolicy::Skip`]
    pub skipped_days: Vec<u32>,
    pub files_downloaded: usize,
    pub files_cached: usize,
    /// Location of the summary file
    pub summary_path: PathBuf,
}

impl RunSummary {
    pub fn days_processed(&self) -> usize {
        self.means.len()
    }
}

/// Loads one cached scan and turns it into a clipped lat/lon grid.
///
/// Non-finite cells are masked without changing the shape, so every grid of
/// a day lands on the same target axes.
pub fn transform_scan(
    path: &Path,
    variable: &str,
    bbox: &BoundingBox,
    resolution: f64,
) -> PipelineResult<GeoGrid> {
    let mut scan = ScanGrid::load(path, variable)?;
    scan.to_metric();
    debug!(
        "{}: {:?} cells, {} finite, {}",
        path.display(),
        scan.shape(),
        scan.finite_count(),
        scan.projection.to_proj4()
    );
    reproject_bilinear(&scan, bbox, resolution)?.clip_box(bbox)
}

/// Runs the day-aggregation flow over `config.days()`.
///
/// Writes `<YYYY>_<DDD>_LST.json` for every day with data and, once all days
/// are done, `daily_mean_LST_US.json` with the daily spatial means in day
/// order. The first failing file aborts the run.
///
/// # Errors
///
/// - [`PipelineError::Config`] when the configuration does not validate
/// - [`PipelineError::NoObjects`] for an empty day under [`EmptyPolicy::Fail`]
/// - storage, NetCDF, transform and output errors as they occur
pub async fn run_pipeline<S: StorageBackend + ?Sized>(
    config: &PipelineConfig,
    store: &S,
) -> PipelineResult<RunSummary> {
    config.validate()?;

    let days = config.days();
    let progress = day_progress_bar(config, days.clone().count() as u64);
    let mut throttle = Throttle::from_config(&config.throttle);
    let mut summary = RunSummary::default();

    for jday in days {
        progress.set_message(day_label(config.year, jday));
        let entries = list_day_objects(store, &config.product, config.year, jday).await?;

        if entries.is_empty() {
            match config.on_empty {
                EmptyPolicy::Skip => {
                    warn!("No files found for {}, skipping", day_label(config.year, jday));
                    summary.skipped_days.push(jday);
                    progress.inc(1);
                    continue;
                }
                EmptyPolicy::Fail => {
                    progress.abandon();
                    return Err(PipelineError::NoObjects {
                        prefix: day_prefix(&config.product, config.year, jday),
                    });
                }
            }
        }

        info!(
            "Processing {} ({} files)",
            day_label(config.year, jday),
            entries.len()
        );
        let mut accumulator = DayAccumulator::new();
        for entry in &entries {
            let path = fetch_entry(config, store, jday, entry, &mut summary).await?;
            let grid = transform_blocking(path, config).await?;
            accumulator.push(&grid)?;
        }

        let aggregate = accumulator.finish(config.stride)?;
        let record = DailyRecord {
            date: day_label(config.year, jday),
            data: aggregate.records(),
        };
        let mean = aggregate.spatial_mean();
        info!(
            "{}: {} of {} cells finite, mean {:?}",
            record.date,
            record.data.len(),
            aggregate.candidate_count(),
            mean
        );
        write_daily_record(&config.output_dir, config.year, jday, &record)?;
        summary.means.push(DailyMean {
            date: record.date,
            mean,
        });

        progress.inc(1);
        throttle.pace().await;
    }
    progress.finish_and_clear();

    summary.summary_path = write_summary(&config.output_dir, &summary.means)?;
    info!(
        "Processed {} days ({} skipped), {} downloads, {} cache hits",
        summary.days_processed(),
        summary.skipped_days.len(),
        summary.files_downloaded,
        summary.files_cached
    );
    Ok(summary)
}

/// Result of [`run_single_scan`]
#[derive(Debug, Clone)]
pub struct SingleScan {
    pub key: String,
    pub grid: GeoGrid,
    pub finite_cells: usize,
}

/// Runs the single-file flow on the first scan of `jday`.
///
/// Unlike [`run_pipeline`], rows and columns without any finite cell are
/// dropped before reprojection. When `output` is given the grid is written
/// there as JSON.
///
/// # Errors
///
/// [`PipelineError::Config`] when the configuration does not validate, and
/// the fetch and transform errors of [`run_pipeline`].
pub async fn run_single_scan<S: StorageBackend + ?Sized>(
    config: &PipelineConfig,
    store: &S,
    jday: u32,
    on_empty: EmptyPolicy,
    output: Option<&Path>,
) -> PipelineResult<Option<SingleScan>> {
    config.validate()?;
    let entries = list_day_objects(store, &config.product, config.year, jday).await?;
    let Some(entry) = entries.first() else {
        return match on_empty {
            EmptyPolicy::Skip => {
                warn!("No files found for {}", day_label(config.year, jday));
                Ok(None)
            }
            EmptyPolicy::Fail => Err(PipelineError::NoObjects {
                prefix: day_prefix(&config.product, config.year, jday),
            }),
        };
    };

    let mut counts = RunSummary::default();
    let path = fetch_entry(config, store, jday, entry, &mut counts).await?;

    let variable = config.variable.clone();
    let bbox = config.bbox;
    let resolution = config.resolution;
    let grid = tokio::task::spawn_blocking(move || -> PipelineResult<GeoGrid> {
        let mut scan = ScanGrid::load(&path, &variable)?;
        scan.drop_empty_lines()?;
        scan.to_metric();
        reproject_bilinear(&scan, &bbox, resolution)?.clip_box(&bbox)
    })
    .await??;

    let finite_cells = grid.values.iter().filter(|v| v.is_finite()).count();
    if let Some(output) = output {
        write_scan_grid(output, &grid)?;
        info!("Wrote {} cells to {}", finite_cells, output.display());
    }

    Ok(Some(SingleScan {
        key: entry.key.clone(),
        grid,
        finite_cells,
    }))
}

async fn fetch_entry<S: StorageBackend + ?Sized>(
    config: &PipelineConfig,
    store: &S,
    jday: u32,
    entry: &ObjectEntry,
    summary: &mut RunSummary,
) -> PipelineResult<PathBuf> {
    let path = cache_path(
        &config.cache_dir,
        &config.product,
        config.year,
        jday,
        &entry.key,
    );
    match fetch_cached(store, entry, &path, &config.cache).await? {
        FetchOutcome::Downloaded => summary.files_downloaded += 1,
        FetchOutcome::Cached => summary.files_cached += 1,
    }
    Ok(path)
}

async fn transform_blocking(path: PathBuf, config: &PipelineConfig) -> PipelineResult<GeoGrid> {
    let variable = config.variable.clone();
    let bbox = config.bbox;
    let resolution = config.resolution;
    tokio::task::spawn_blocking(move || transform_scan(&path, &variable, &bbox, resolution)).await?
}

fn day_progress_bar(config: &PipelineConfig, days: u64) -> ProgressBar {
    if !config.progress {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(days).with_style(style)
}
