//! medrec CLI - resolve a patient identity across configured data sources
//! and print the aggregated record report.
//!
//! The report text is the hand-off point for downstream analysis tooling;
//! this binary owns configuration, pool startup, and logging setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use medrec_core::{MpiRegistry, PoolManager, RecordService};

mod config;

use config::FileConfig;

#[derive(Parser, Debug)]
#[command(
    name = "medrec",
    author,
    version,
    about = "Aggregate a patient's records across independently-schemad data sources",
    long_about = "Resolves a partial patient identity against every configured source via the \
                  MPI registry, then concurrently fetches and merges every matching record \
                  into a single report."
)]
struct Cli {
    /// Patient identifier to resolve
    #[arg(long)]
    patient_id: Option<String>,

    /// Patient full name to resolve
    #[arg(long)]
    full_name: Option<String>,

    /// Path to the TOML source configuration
    #[arg(long, default_value = "medrec.toml")]
    config: PathBuf,

    /// Path to the NDJSON MPI registry (overrides the config file)
    #[arg(long, env = "MPI_FILE_PATH")]
    mpi_file: Option<PathBuf>,

    /// Per-source time budget for aggregation, in seconds
    #[arg(long)]
    source_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.patient_id.is_none() && cli.full_name.is_none() {
        anyhow::bail!("supply --patient-id and/or --full-name");
    }

    let file_config = FileConfig::load(&cli.config)?;
    let mpi_path = cli
        .mpi_file
        .or_else(|| file_config.mpi_file.clone())
        .context("no MPI registry path: set --mpi-file, MPI_FILE_PATH, or mpi_file in the config")?;

    let registry = MpiRegistry::load(&mpi_path);
    let source_configs = file_config.source_configs();
    info!(
        "{} MPI records, {} configured sources",
        registry.len(),
        source_configs.len()
    );

    let pools = PoolManager::connect(&source_configs).await;
    let mut service = RecordService::new(registry, Arc::new(pools));
    if let Some(secs) = cli.source_timeout_secs {
        service = service.with_source_timeout(Duration::from_secs(secs));
    }

    let report = service
        .fetch_patient_records(cli.patient_id.as_deref(), cli.full_name.as_deref())
        .await?;

    match report {
        Some(report) => println!("{report}"),
        None => println!("No records found for the supplied identity."),
    }
    Ok(())
}
