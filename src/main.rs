use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

mod common;
mod observability;
mod pipeline;

use common::config::IngestConfig;
use observability::logging::init_logging;
use pipeline::processing::vald::ValdReader;
use pipeline::storage;

#[derive(Parser)]
#[command(name = "vald-ingest")]
#[command(about = "Ingest a VALD line list into a columnar store")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, parse, and export a line list
    Ingest {
        /// Local path or http(s) URL of the line list (default: public VALD dump)
        #[arg(long)]
        source: Option<String>,
        /// Root directory of the output store
        #[arg(long)]
        out: Option<PathBuf>,
        /// TOML config file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Comma-separated ion filter (accepted, not applied yet)
        #[arg(long)]
        ions: Option<String>,
    },
    /// Load a line list and pretty-print the first rows
    Inspect {
        /// Local path or http(s) URL of the line list (default: public VALD dump)
        #[arg(long)]
        source: Option<String>,
        /// Show the parsed view instead of the raw one
        #[arg(long)]
        parsed: bool,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    init_logging();

    match cli.command {
        Commands::Ingest {
            source,
            out,
            config,
            ions,
        } => {
            let cfg = match config {
                Some(path) => IngestConfig::from_path(&path)?,
                None => IngestConfig::default(),
            }
            .override_with(source, out, ions);

            let mut reader = ValdReader::new(cfg.source.clone())
                .with_unique_level_identifier(cfg.unique_level_identifier.clone());
            if let Some(ions) = cfg.ions.clone() {
                info!("Ion filter {:?} is carried but not applied", ions);
                reader = reader.with_ion_filter(ions);
            }

            println!("🛰️  Ingesting line list from {}", reader.source());
            reader.export(&cfg.out_dir)?;
            println!(
                "✅ Wrote {} raw / {} parsed lines to {} (payload sha256 {})",
                reader.raw()?.len(),
                reader.parsed()?.len(),
                cfg.out_dir.display(),
                &reader.checksum()?[..12],
            );
        }
        Commands::Inspect {
            source,
            parsed,
            limit,
        } => {
            let reader = ValdReader::new(source);
            let batch = if parsed {
                storage::parsed_batch(reader.parsed()?)?
            } else {
                storage::raw_batch(reader.raw()?)?
            };
            let shown = limit.min(batch.num_rows());
            arrow::util::pretty::print_batches(&[batch.slice(0, shown)])?;
            println!(
                "{} of {} lines shown from {}",
                shown,
                reader.raw()?.len(),
                reader.source()
            );
        }
    }

    Ok(())
}
