use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use goes2json::cli::{Cli, Commands, render_template, resolve_config};
use goes2json::log::{
    config_echo, show_farewell_with_timing, show_greeting, show_run_summary, show_scan_info,
};
use goes2json::storage::StorageFactory;
use goes2json::{run_pipeline, run_single_scan};
use log::LevelFilter;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Commands::Template { output, format } => {
            let text = render_template(*format)?;
            write_or_print(output.as_deref(), text.as_bytes())
        }
        Commands::Completions { shell, output } => {
            let mut buffer = Vec::new();
            generate(*shell, &mut Cli::command(), "goes2json", &mut buffer);
            write_or_print(output.as_deref(), &buffer)
        }
        Commands::Run { .. } | Commands::Scan { .. } => run(&cli).await,
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let start_time = Instant::now();
    let config_path = cli.config.as_deref();
    let banners = !cli.quiet;

    if banners {
        show_greeting(config_path.and_then(Path::to_str));
    }
    let config = resolve_config(config_path, &cli.command).context("Invalid configuration")?;
    if banners {
        config_echo(&config);
    }

    let store = StorageFactory::from_uri(&config.source, &config.region)
        .await
        .with_context(|| format!("Cannot open source {}", config.source))?;

    match &cli.command {
        Commands::Scan {
            day,
            output,
            on_empty,
            ..
        } => {
            let scan = run_single_scan(&config, &store, *day, (*on_empty).into(), output.as_deref())
                .await
                .with_context(|| format!("Scan of day {:03} failed", day))?;
            if banners && let Some(scan) = &scan {
                show_scan_info(scan);
            }
        }
        _ => {
            let summary = run_pipeline(&config, &store)
                .await
                .context("Daily aggregation failed")?;
            if banners {
                show_run_summary(&summary);
            }
        }
    }

    if banners {
        show_farewell_with_timing(start_time.elapsed());
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if cli.quiet {
        builder.filter_level(LevelFilter::Error);
    }
    builder.init();
}

fn write_or_print(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Cannot write {}", path.display()))?,
        None => std::io::stdout().write_all(bytes)?,
    }
    Ok(())
}
