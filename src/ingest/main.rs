//! Tower site ingest.
//!
//! Reads an operator site export (CSV), buffers every site into a coverage
//! polygon and writes the coverage GeoJSON dataset loaded by the query
//! server.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use netcover::sites::{coverage_collection, read_sites_path, DEFAULT_BUFFER_KM};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build a coverage GeoJSON dataset from a tower site CSV")]
struct Args {
    /// Site export with latitude, longitude, network_provider and technology columns
    #[arg(short, long)]
    sites: PathBuf,

    /// Output coverage GeoJSON file
    #[arg(short, long, default_value = "data/coverage.geojson")]
    output: PathBuf,

    /// Coverage radius around each site, in kilometres
    #[arg(long, default_value_t = DEFAULT_BUFFER_KM)]
    buffer_km: f64,

    /// Vertices per buffer polygon
    #[arg(long, default_value = "64")]
    segments: usize,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("netcover site ingest");
    info!("Sites: {}", args.sites.display());

    let sites = read_sites_path(&args.sites).context("Failed to read site export")?;

    let pb = ProgressBar::new(sites.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let collection = coverage_collection(pb.wrap_iter(sites.iter()), args.buffer_km, args.segments)
        .context("Failed to buffer sites")?;
    pb.finish_and_clear();

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let file = File::create(&args.output).context("Failed to create output file")?;
    serde_json::to_writer(BufWriter::new(file), &collection)
        .context("Failed to write coverage GeoJSON")?;

    info!(
        "Wrote {} coverage regions ({} km buffer) to {}",
        collection.features.len(),
        args.buffer_km,
        args.output.display()
    );

    Ok(())
}
