use crate::input::{PipelineConfig, ThrottleConfig};
use crate::pipeline::{RunSummary, SingleScan};
use std::time::Duration;

pub fn show_greeting(config_path: Option<&str>) {
    println!("=== GOES-18 LST to JSON ===");
    match config_path {
        Some(path) => println!("Loading configuration from: {}", path),
        None => println!("Using built-in configuration"),
    }
}

pub fn config_echo(config: &PipelineConfig) {
    println!("\nConfiguration:");
    println!("  Source: {} ({})", config.source, config.region);
    println!("  Product: {}", config.product);
    println!("  Variable: {}", config.variable);
    println!(
        "  Days: {}-{:03} to {}-{:03}",
        config.year, config.first_day, config.year, config.last_day
    );
    println!("  Cache: {}", config.cache_dir.display());
    println!("  Output: {}", config.output_dir.display());
    println!(
        "  Grid: {}° over lon [{}, {}], lat [{}, {}], stride {}",
        config.resolution,
        config.bbox.min_lon,
        config.bbox.max_lon,
        config.bbox.min_lat,
        config.bbox.max_lat,
        config.stride
    );
    match &config.throttle {
        ThrottleConfig::None => println!("  Throttle: none"),
        ThrottleConfig::Fixed { delay_ms } => println!("  Throttle: {} ms per day", delay_ms),
        ThrottleConfig::TokenBucket {
            capacity,
            refill_per_sec,
        } => println!(
            "  Throttle: bursts of {} days, {} days/s",
            capacity, refill_per_sec
        ),
    }
}

pub fn show_run_summary(summary: &RunSummary) {
    println!("\nRun Summary:");
    println!("  Days processed: {}", summary.days_processed());
    if !summary.skipped_days.is_empty() {
        let skipped: Vec<String> = summary
            .skipped_days
            .iter()
            .map(|d| format!("{:03}", d))
            .collect();
        println!("  Days without data: {}", skipped.join(", "));
    }
    println!(
        "  Files: {} downloaded, {} from cache",
        summary.files_downloaded, summary.files_cached
    );
    println!("  Summary file: {}", summary.summary_path.display());
}

pub fn show_scan_info(scan: &SingleScan) {
    let grid = &scan.grid;
    let (rows, cols) = grid.shape();
    println!("\nScan: {}", scan.key);
    println!("  Time: {}", grid.time);
    println!("  Grid: {} x {} cells", rows, cols);
    if let (Some(first), Some(last)) = (grid.lats.first(), grid.lats.last()) {
        println!("  Latitude: {} to {}", first, last);
    }
    if let (Some(first), Some(last)) = (grid.lons.first(), grid.lons.last()) {
        println!("  Longitude: {} to {}", first, last);
    }

    let finite = grid.values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    println!("  Cells with data: {}", scan.finite_cells);
    if scan.finite_cells > 0 {
        println!("  Range: {} to {}", min, max);
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!("\n=== Completed in {:.2?} ===", elapsed);
}
