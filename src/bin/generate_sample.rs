//! Write a few months of synthetic trip partitions.
//!
//! ```sh
//! cargo run --bin generate_sample -- --out-dir data/raw --months 2023-01,2023-02,2023-03
//! ```
//!
//! Odd months store timestamps in nanoseconds, even months in microseconds,
//! so loads exercise precision harmonization.

use std::path::PathBuf;

use anyhow::{Context, Result};
use arrow::datatypes::TimeUnit;
use clap::Parser;
use tlc_loader::data::synthetic::{write_month, SyntheticMonth};
use tlc_loader::LoaderConfig;

#[derive(Parser, Debug)]
#[command(about = "Generate synthetic monthly trip partitions")]
struct Args {
    /// Output directory, created if missing.
    #[arg(long, default_value = "data/raw")]
    out_dir: PathBuf,

    /// Comma-separated `YYYY-MM` months.
    #[arg(long, value_delimiter = ',', default_value = "2023-01,2023-02,2023-03,2023-04")]
    months: Vec<String>,

    /// Trips per month.
    #[arg(long, default_value_t = 10_000)]
    rows: usize,

    /// Every n-th trip is invalid (zero miles, negative fare); 0 disables.
    #[arg(long, default_value_t = 50)]
    invalid_every: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let prefix = LoaderConfig::default().file_prefix;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    for (i, month) in args.months.iter().enumerate() {
        let unit = if i % 2 == 0 {
            TimeUnit::Nanosecond
        } else {
            TimeUnit::Microsecond
        };
        let mut trips = SyntheticMonth::new(month, args.rows, unit).with_seed(args.seed);
        if args.invalid_every > 0 {
            trips = trips.with_invalid_every(args.invalid_every);
        }
        let path = write_month(&args.out_dir, &prefix, &trips)
            .with_context(|| format!("writing month {month}"))?;
        println!("Wrote {} trips ({unit:?}) to {}", args.rows, path.display());
    }
    Ok(())
}
