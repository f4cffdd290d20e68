//! Skylog Service - record temperatures and query window statistics.
//!
//! Run with: `cargo run -p skylog-service -- record delhi 305.2 --category haze`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tracing::{info, warn};

use skylog_service::{AggregationService, Config, RecordOutcome, spawn_housekeeping};
use skylog_types::{SampleRecord, TemperatureUnit, WindowStatistics};

/// Skylog Service - per-city temperature history and window statistics.
#[derive(Parser, Debug)]
#[command(name = "skylog-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// History directory (overrides config).
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a temperature sample for a city.
    Record {
        /// City name.
        entity: String,

        /// Temperature in Kelvin.
        #[arg(value_parser = parse_kelvin)]
        value: f64,

        /// Weather condition, e.g. "rain".
        #[arg(long)]
        category: Option<String>,

        /// Observation time (RFC 3339). Defaults to now.
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<OffsetDateTime>,

        /// Unit for the printed statistics (overrides config).
        #[arg(short, long)]
        unit: Option<TemperatureUnit>,
    },

    /// Show window statistics for a city.
    Stats {
        /// City name.
        entity: String,

        /// Unit for the printed statistics (overrides config).
        #[arg(short, long)]
        unit: Option<TemperatureUnit>,
    },

    /// Print the retained history of a city.
    History {
        /// City name.
        entity: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Prune stale samples from every city.
    Housekeep {
        /// Run a single pass instead of the periodic loop.
        #[arg(long)]
        once: bool,
    },
}

fn parse_timestamp(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(s, &Rfc3339)
}

fn parse_kelvin(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{s} is not a finite temperature"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skylog_service=info".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(data_dir) = args.data_dir {
        config.storage.path = data_dir;
    }
    config.validate()?;

    let service = AggregationService::from_config(&config)
        .with_context(|| format!("Failed to open history at {:?}", config.storage.path))?;

    match args.command {
        Command::Record {
            entity,
            value,
            category,
            at,
            unit,
        } => {
            let now = OffsetDateTime::now_utc();
            let mut sample = SampleRecord::new(at.unwrap_or(now), value);
            if let Some(category) = category {
                sample = sample.with_category(category);
            }
            let outcome = service
                .record_with(
                    &entity,
                    sample,
                    now,
                    service.window(),
                    unit.unwrap_or(service.unit()),
                )
                .await?;
            print_outcome(&outcome);
        }
        Command::Stats { entity, unit } => {
            let unit = unit.unwrap_or(service.unit());
            let stats = service
                .statistics(&entity, OffsetDateTime::now_utc(), unit)
                .await?;
            match stats {
                Some(stats) => print_statistics(&stats),
                None => println!("No samples for {} in the current window", entity),
            }
        }
        Command::History { entity, json } => {
            let history = service.history(&entity).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                let unit = service.unit();
                for sample in &history {
                    println!(
                        "{}  {:>8.2}{}  {}",
                        sample.timestamp.format(&Rfc3339)?,
                        sample.value_in(unit),
                        unit.symbol(),
                        sample.category.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Command::Housekeep { once } => {
            if once {
                let removed = service.housekeep(OffsetDateTime::now_utc()).await?;
                println!("Pruned {} stale samples", removed);
            } else {
                run_housekeeping(service, &config).await?;
            }
        }
    }

    Ok(())
}

async fn run_housekeeping(service: AggregationService, config: &Config) -> anyhow::Result<()> {
    let Some(period) = config.retention.housekeeping_interval() else {
        warn!("Housekeeping is disabled (retention.housekeeping_interval_secs = 0)");
        return Ok(());
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = spawn_housekeeping(Arc::new(service), period, shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down housekeeping...");

    let _ = shutdown_tx.send(true);
    task.await?;
    Ok(())
}

fn print_outcome(outcome: &RecordOutcome) {
    println!(
        "{}: {:.2}{}",
        outcome.entity,
        outcome.latest_value(),
        outcome.unit.symbol()
    );

    if let Some(alert) = &outcome.alert {
        warn!("{}: {}", outcome.entity, alert);
    }

    match &outcome.statistics {
        Some(stats) => print_statistics(stats),
        None => println!("No samples in the current window"),
    }
}

fn print_statistics(stats: &WindowStatistics) {
    let symbol = stats.unit.symbol();
    println!("  samples:   {}", stats.sample_count);
    println!("  max:       {:.2}{}", stats.max, symbol);
    println!("  min:       {:.2}{}", stats.min, symbol);
    println!("  mean:      {:.2}{}", stats.mean, symbol);
    println!(
        "  condition: {}",
        stats.dominant_category.as_deref().unwrap_or("-")
    );
}
