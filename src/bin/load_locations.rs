//! Load locations into the target schema
//!
//! Reads areas from the source geography table, then replaces the contents
//! of `location`, `location_type` and `location_type_parent_location_types`
//! in the target database.
//!
//! # Usage
//!
//! ```bash
//! # Full load using ./config.toml
//! load_locations
//!
//! # Preview counts against a different snapshot date
//! load_locations --as-of 2020-01-01 --dry-run
//!
//! # Explicit URLs (take precedence over config.toml)
//! SOURCE_DATABASE_URL=postgresql:///geo TARGET_DATABASE_URL=postgresql:///sdc \
//!     load_locations --format json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use location_loader::config::ConfigOverrides;
use location_loader::database::{
    DatabaseConfig, DatabaseManager, PgGeoSource, PgLocationSink,
};
use location_loader::{LoadOptions, LoadReport, LoaderConfig, LocationLoader};

#[derive(Parser)]
#[command(name = "load_locations")]
#[command(version)]
#[command(about = "Load location, location_type and type-hierarchy tables from a PostGIS source")]
#[command(long_about = None)]
struct Cli {
    /// Config file
    #[arg(short, long, env = "LOCATION_LOADER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Target database name on the source server (ignored when TARGET_DATABASE_URL is set)
    #[arg(long)]
    target_db: Option<String>,

    /// Load areas valid on this date (YYYY-MM-DD)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// ST_Simplify tolerance, in source units
    #[arg(long)]
    tolerance: Option<f64>,

    /// Relationship CSV (child_type,parent_type)
    #[arg(long)]
    relationships: Option<PathBuf>,

    /// Locations per INSERT
    #[arg(long)]
    batch_size: Option<usize>,

    /// Read and transform only, leave the target untouched
    #[arg(long)]
    dry_run: bool,

    /// Report format
    #[arg(long, short = 'o', default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,location_loader=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = LoaderConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    config.apply_overrides(ConfigOverrides {
        target_db: cli.target_db,
        as_of: cli.as_of,
        simplify_tolerance: cli.tolerance,
        batch_size: cli.batch_size,
        relationships_csv: cli.relationships,
    });

    let mut options = LoadOptions::from_config(&config).context("Invalid configuration")?;
    options.dry_run = cli.dry_run;

    let urls = config.connection_urls()?;
    let max_connections = config.load.max_connections;

    let source_db = DatabaseManager::connect(&DatabaseConfig::new(urls.source, max_connections))
        .await
        .context("Failed to connect to source database")?;
    match source_db.postgis_version().await? {
        Some(version) => info!("Source PostGIS {}", version),
        None => warn!("PostGIS extension not found on source database"),
    }

    let target_db = DatabaseManager::connect(&DatabaseConfig::new(urls.target, max_connections))
        .await
        .context("Failed to connect to target database")?;
    target_db
        .test_connection()
        .await
        .context("Target database is not reachable")?;

    let mut loader = LocationLoader::new(
        PgGeoSource::new(source_db.pool().clone()),
        PgLocationSink::new(target_db.pool().clone()),
        options,
    );
    let report = loader.run().await.context("Location load failed")?;
    drop(loader);

    print_report(&report, cli.format)?;

    source_db.close().await;
    target_db.close().await;
    Ok(())
}

fn print_report(report: &LoadReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
