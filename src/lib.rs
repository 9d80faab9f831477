//! Feature-resolving lazy loader for monthly-partitioned Parquet trip data.
//!
//! ```no_run
//! use tlc_loader::{FeatureCatalog, LoadOptions, Loader, LoaderConfig};
//!
//! # fn main() -> tlc_loader::Result<()> {
//! let loader = Loader::with_catalog(LoaderConfig::new("data/raw"), FeatureCatalog::tlc())?;
//! let table = loader
//!     .load(&["pickup_hour", "fare"], &LoadOptions::default().months(&["2023-01"]))?
//!     .collect()?;
//! println!("{} rows", table.num_rows());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod plan;
pub mod resolve;

pub use batch::BatchOrchestrator;
pub use config::{LoaderConfig, MonthMatch};
pub use data::loader::{LoadOptions, LoadOutput, Loader};
pub use data::model::Partition;
pub use engine::{DeferredPlan, ExecutionEngine, ParquetEngine};
pub use error::{LoaderError, Result};
pub use resolve::{
    CatalogDerivationStrategy, CleaningRule, Feature, FeatureCatalog, RawColumnStrategy,
    ResolutionStrategy,
};
