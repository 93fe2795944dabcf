//! rechunk binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rechunk_core::config::AppConfig;
use rechunk_job::Orchestrator;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Split a large delimited object into line-aligned chunks, process them
/// concurrently and reassemble the result with a multipart upload.
#[derive(Parser, Debug)]
#[command(name = "rechunk")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "RECHUNK_CONFIG")]
    config: Option<PathBuf>,

    /// Key of the source object
    #[arg(long)]
    input_key: Option<String>,

    /// Key to write the output object to
    #[arg(long)]
    output_key: Option<String>,

    /// Field delimiter of the header line
    #[arg(long)]
    delimiter: Option<String>,

    /// Maximum number of chunks processed at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Minimum lines per chunk
    #[arg(long)]
    min_lines_per_chunk: Option<u64>,

    /// Minimum chunk size in bytes
    #[arg(long)]
    min_chunk_size_bytes: Option<u64>,

    /// Re-read the output and check its line count
    #[arg(long)]
    verify_output: bool,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if let Some(path) = &args.config {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("RECHUNK_").ignore(&["CONFIG"]).split("__"));

    if let Some(v) = &args.input_key {
        figment = figment.merge(Serialized::default("job.input_key", v));
    }
    if let Some(v) = &args.output_key {
        figment = figment.merge(Serialized::default("job.output_key", v));
    }
    if let Some(v) = &args.delimiter {
        figment = figment.merge(Serialized::default("job.delimiter", v));
    }
    if let Some(v) = args.max_concurrency {
        figment = figment.merge(Serialized::default("job.max_concurrency", v));
    }
    if let Some(v) = args.min_lines_per_chunk {
        figment = figment.merge(Serialized::default("job.min_lines_per_chunk", v));
    }
    if let Some(v) = args.min_chunk_size_bytes {
        figment = figment.merge(Serialized::default("job.min_chunk_size_bytes", v));
    }
    if args.verify_output {
        figment = figment.merge(Serialized::default("job.verify_output", true));
    }

    let config: AppConfig = figment
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("rechunk v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;

    let storage = rechunk_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    let orchestrator = Orchestrator::new(storage, config.job).context("invalid job configuration")?;
    let summary = orchestrator.run().await.context("job failed")?;

    println!("Total records: {}", summary.total_records);
    match &summary.upload_id {
        Some(_) => println!(
            "Done: wrote {} bytes in {} parts to {}",
            summary.bytes_written,
            summary.parts,
            orchestrator.config().output_key
        ),
        None => println!("Done: nothing to write"),
    }
    Ok(())
}
