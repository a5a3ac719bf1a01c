//! Zonal statistics runner.
//!
//! Computes per-polygon raster statistics for one dataset across its
//! configured countries and admin levels, and upserts them into
//! PostgreSQL (or an in-memory store with `--dry-run`).

mod config;
mod geojson;
mod pipeline;
mod sources;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zonal_stats::{BatchRunner, StatsSink};

use config::load_pipeline_config;
use pipeline::Pipeline;
use sources::{GeoJsonBoundarySource, LocalGridSource};
use storage::{MemoryStatsStore, PgStatsStore};

#[derive(Parser, Debug)]
#[command(name = "stats-runner")]
#[command(about = "Zonal raster statistics over administrative boundaries")]
struct Args {
    /// Dataset configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Use the test section of the configuration
    #[arg(long)]
    test: bool,

    /// Keep results in memory instead of writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Print polygon coverage at this upscale factor instead of statistics
    #[arg(long, value_name = "FACTOR")]
    coverage: Option<usize>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = load_pipeline_config(&args.config)?;
    let plan = config.plan(args.test, Utc::now().date_naive())?;
    let runner_config = config.runner_config();
    info!(
        dataset = %config.dataset,
        forecast = config.forecast,
        start_date = %plan.start_date,
        end_date = %plan.end_date,
        dates = plan.dates.len(),
        countries = ?plan.countries.iter().map(|c| c.iso3.as_str()).collect::<Vec<_>>(),
        stats = ?runner_config.stats.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        test = args.test,
        "Loaded configuration"
    );

    let sink: Arc<dyn StatsSink> = if args.dry_run || args.coverage.is_some() {
        Arc::new(MemoryStatsStore::new())
    } else {
        let url = args
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set unless --dry-run is given")?;
        let store = PgStatsStore::connect(url).await?;
        store.ensure_tables(&config.dataset, config.forecast).await?;
        Arc::new(store)
    };

    let mut pipeline = Pipeline::new(
        config.dataset.clone(),
        config.forecast,
        BatchRunner::new(runner_config)?,
        Arc::new(LocalGridSource::new(&config.grid_path)),
        Arc::new(GeoJsonBoundarySource::new(&config.boundary_dir)),
        sink,
    );

    if let Some(factor) = args.coverage {
        for report in pipeline.coverage(&plan, factor).await? {
            println!("{}", serde_json::to_string(&report)?);
        }
        return Ok(());
    }

    let summary = pipeline.run(&plan).await?;
    if !summary.is_clean() {
        warn!(
            dataset = %config.dataset,
            units_failed = summary.units_failed,
            "Some units failed; see the QA table"
        );
    }
    Ok(())
}
