//! Command line front end for the trip loader.
//!
//! ## Usage
//!
//! ```sh
//! tlc-loader --data-dir data/raw features
//! tlc-loader --data-dir data/raw load --features pickup_hour,fare --months 2023-01,2023-02
//! tlc-loader --data-dir data/raw load --features fare --sample-ratio 0.1 --batch-size 2 --output fares.csv
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use log::info;
use tlc_loader::{FeatureCatalog, LoadOptions, LoadOutput, Loader, LoaderConfig, MonthMatch};

#[derive(Parser, Debug)]
#[command(name = "tlc-loader", version, about = "Load derived features from monthly trip partitions")]
struct Cli {
    /// JSON config file; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding `<prefix>_YYYY-MM.parquet` files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Match month tokens against month keys exactly instead of by substring.
    #[arg(long, global = true)]
    exact_months: bool,

    /// Treat requested names as raw columns instead of catalog features.
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the names that can be loaded.
    Features,

    /// Load features and print or save them.
    Load {
        /// Comma-separated feature names.
        #[arg(long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Comma-separated month tokens; all months when omitted.
        #[arg(long, value_delimiter = ',')]
        months: Vec<String>,

        /// Fraction of rows to keep, in (0, 1].
        #[arg(long, default_value_t = 1.0)]
        sample_ratio: f64,

        /// Load this many months at a time.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Print the plan instead of running it.
        #[arg(long)]
        explain: bool,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        head: usize,

        /// Write every row to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    let loader = if cli.raw {
        Loader::raw(config)
    } else {
        Loader::with_catalog(config, FeatureCatalog::tlc())
    }
    .context("opening partitions")?;

    match cli.command {
        Command::Features => {
            for name in loader.list_features()? {
                println!("{name}");
            }
        }
        Command::Load {
            features,
            months,
            sample_ratio,
            batch_size,
            explain,
            head,
            output,
        } => {
            let table = if explain {
                let options = LoadOptions {
                    months: Some(months),
                    sample_ratio,
                    collect: false,
                };
                if let LoadOutput::Deferred(plan) = loader.load(&features, &options)? {
                    println!("{}", plan.explain());
                }
                return Ok(());
            } else if let Some(batch_size) = batch_size {
                loader.load_in_batches(&features, Some(months.as_slice()), batch_size, sample_ratio)?
            } else {
                let options = LoadOptions {
                    months: Some(months),
                    sample_ratio,
                    collect: true,
                };
                loader.load(&features, &options)?.collect()?
            };

            println!("{} rows x {} columns", table.num_rows(), table.num_columns());
            let shown = table.slice(0, head.min(table.num_rows()));
            println!("{}", pretty_format_batches(&[shown])?);

            if let Some(path) = output {
                write_csv(&path, &table)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Wrote {} rows to {}", table.num_rows(), path.display());
            }
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.exact_months {
        config.month_match = MonthMatch::Exact;
    }
    Ok(config)
}

fn write_csv(path: &Path, table: &RecordBatch) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let schema = table.schema();
    writer.write_record(schema.fields().iter().map(|f| f.name().as_str()))?;

    let options = FormatOptions::default();
    let formatters = table
        .columns()
        .iter()
        .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()?;
    for row in 0..table.num_rows() {
        writer.write_record(formatters.iter().map(|f| f.value(row).to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
