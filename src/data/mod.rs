/// Data layer: partition discovery, month selection and the loader.
///
/// Architecture:
/// ```text
///  <data_dir>/<prefix>_YYYY-MM.parquet
///        │
///        ▼
///   ┌──────────┐
///   │ discover  │  list files → Vec<Partition>, sorted by path
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  month tokens → selected partitions
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  features → resolve → plan → table or deferred plan
///   └──────────┘
/// ```

pub mod discover;
pub mod filter;
pub mod loader;
pub mod model;
pub mod synthetic;
