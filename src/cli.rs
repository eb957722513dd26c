//! # CLI Module
//!
//! Command-line interface for goes2json:
//! - Argument parsing with clap, with `GOES2JSON_` environment fallbacks
//! - Configuration file loading (JSON/YAML) with command-line overrides
//! - Subcommands for the daily run, single-scan exploration, templates and
//!   shell completions

use crate::error::{PipelineError, PipelineResult};
use crate::input::{EmptyPolicy, PipelineConfig, ThrottleConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Daily GOES-18 land surface temperature maps as JSON
#[derive(Parser, Debug)]
#[command(name = "goes2json")]
#[command(about = "Reproject GOES-18 LST scans and aggregate them into daily JSON files")]
#[command(version)]
#[command(long_about = "
goes2json downloads GOES-18 ABI land surface temperature scans from the public
NOAA bucket, reprojects them from the geostationary fixed grid onto a regular
0.05 degree latitude/longitude grid over the United States, averages them per
day and writes compact JSON files for web visualisation.

EXAMPLES:
  # January 2024 with defaults
  goes2json run

  # A few days, custom directories
  goes2json run --days 15-20 --cache-dir /data/goes --output-dir ./lib

  # Local mirror of the bucket instead of S3
  goes2json run --source ./mirror --days 15 --throttle-ms 0

  # Inspect the first scan of a day
  goes2json scan 15 -o scan.json

  # Start from a configuration file
  goes2json template --format yaml -o goes.yaml
  goes2json --config goes.yaml run
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "GOES2JSON_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate a range of days into daily JSON files
    #[command(long_about = "
Process every day of the range: list the day's scans, fetch them into the
cache, reproject each scan, average them and write <YYYY>_<DDD>_LST.json.
A summary of daily spatial means is written to daily_mean_LST_US.json once
all days are done.

EXAMPLES:
  goes2json run --days 1-31
  goes2json run --days 32 --on-empty fail
")]
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Day-of-year range, `DDD` or `DDD-DDD`
        #[arg(long, env = "GOES2JSON_DAYS", value_parser = parse_day_range)]
        days: Option<DayRange>,

        /// Output directory for the JSON files
        #[arg(long, env = "GOES2JSON_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Behaviour for days without any scan
        #[arg(long, value_enum)]
        on_empty: Option<OnEmpty>,

        /// Pause after each processed day in milliseconds (0 disables)
        #[arg(long, env = "GOES2JSON_THROTTLE_MS")]
        throttle_ms: Option<u64>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Reproject the first scan of one day
    #[command(long_about = "
Fetch the first scan of a day, drop rows and columns without data, reproject
and clip it, and report what it covers. With --output the reprojected cells
are written as JSON.

EXAMPLES:
  goes2json scan 15
  goes2json scan 15 --year 2023 -o scan.json
")]
    Scan {
        /// Day of year
        day: u32,

        #[command(flatten)]
        source: SourceArgs,

        /// Write the reprojected grid to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Behaviour when the day has no scan
        #[arg(long, value_enum, default_value_t = OnEmpty::Fail)]
        on_empty: OnEmpty,
    },

    /// Generate a configuration template
    Template {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for bash, zsh, fish and PowerShell.

EXAMPLES:
  goes2json completions bash > ~/.bash_completion.d/goes2json
  goes2json completions zsh -o _goes2json
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Where scans come from and where they are cached
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct SourceArgs {
    /// `s3://bucket` or a local directory laid out like the bucket
    #[arg(long, env = "GOES2JSON_SOURCE")]
    pub source: Option<String>,

    /// AWS region of the bucket
    #[arg(long, env = "GOES2JSON_REGION")]
    pub region: Option<String>,

    /// Product directory, e.g. ABI-L2-LSTF
    #[arg(short, long, env = "GOES2JSON_PRODUCT")]
    pub product: Option<String>,

    /// NetCDF variable to read
    #[arg(short = 'n', long, env = "GOES2JSON_VARIABLE")]
    pub variable: Option<String>,

    #[arg(short, long, env = "GOES2JSON_YEAR")]
    pub year: Option<i32>,

    /// Local download cache
    #[arg(long, env = "GOES2JSON_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnEmpty {
    /// Log and continue
    Skip,
    /// Abort with an error
    Fail,
}

impl From<OnEmpty> for EmptyPolicy {
    fn from(value: OnEmpty) -> Self {
        match value {
            OnEmpty::Skip => EmptyPolicy::Skip,
            OnEmpty::Fail => EmptyPolicy::Fail,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

/// Inclusive day-of-year range from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayRange {
    pub first: u32,
    pub last: u32,
}

/// Parse a day range
/// Format: `DDD` or `DDD-DDD`
fn parse_day_range(s: &str) -> Result<DayRange, String> {
    let parse_day = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid day of year '{}'", part))
    };

    let (first, last) = match s.split_once('-') {
        Some((a, b)) => (parse_day(a)?, parse_day(b)?),
        None => {
            let day = parse_day(s)?;
            (day, day)
        }
    };

    if first == 0 || last > 366 {
        return Err("Days of year must lie within 1-366".to_string());
    }
    if first > last {
        return Err("First day must not be after last day".to_string());
    }
    Ok(DayRange { first, last })
}

impl SourceArgs {
    /// Overwrites the fields given on the command line.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(product) = &self.product {
            config.product = product.clone();
        }
        if let Some(variable) = &self.variable {
            config.variable = variable.clone();
        }
        if let Some(year) = self.year {
            config.year = year;
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
    }
}

impl Commands {
    /// Merges command-line values into `config`; the command line wins.
    pub fn apply_overrides(&self, config: &mut PipelineConfig) {
        match self {
            Commands::Run {
                source,
                days,
                output_dir,
                on_empty,
                throttle_ms,
                no_progress,
            } => {
                source.apply(config);
                if let Some(days) = days {
                    config.first_day = days.first;
                    config.last_day = days.last;
                }
                if let Some(output_dir) = output_dir {
                    config.output_dir = output_dir.clone();
                }
                if let Some(on_empty) = on_empty {
                    config.on_empty = (*on_empty).into();
                }
                match throttle_ms {
                    Some(0) => config.throttle = ThrottleConfig::None,
                    Some(ms) => config.throttle = ThrottleConfig::Fixed { delay_ms: *ms },
                    None => {}
                }
                if *no_progress {
                    config.progress = false;
                }
            }
            Commands::Scan { day, source, .. } => {
                source.apply(config);
                config.first_day = *day;
                config.last_day = *day;
            }
            Commands::Template { .. } | Commands::Completions { .. } => {}
        }
    }
}

/// Loads `path` when given, otherwise starts from the defaults, then applies
/// the command-line overrides and validates the result.
pub fn resolve_config(
    path: Option<&std::path::Path>,
    command: &Commands,
) -> PipelineResult<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    command.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Default configuration rendered in `format`
pub fn render_template(format: ConfigFormat) -> PipelineResult<String> {
    let config = PipelineConfig::default();
    match format {
        ConfigFormat::Json => Ok(serde_json::to_string_pretty(&config)?),
        ConfigFormat::Yaml => serde_yaml::to_string(&config)
            .map_err(|e| PipelineError::Config(format!("YAML serialization error: {}", e))),
    }
}
