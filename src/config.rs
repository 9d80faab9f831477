use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};
use crate::plan::sample::DEFAULT_PRIORITY;

// ---------------------------------------------------------------------------
// Month matching mode
// ---------------------------------------------------------------------------

/// How month tokens passed to `load` are matched against partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthMatch {
    /// Token is a substring of the partition path or month key.
    /// `"2024-1"` therefore also selects `2024-10`, `2024-11`, `2024-12`.
    #[default]
    Substring,
    /// Token equals the partition month key.
    Exact,
}

// ---------------------------------------------------------------------------
// LoaderConfig
// ---------------------------------------------------------------------------

/// Loader settings. Every field has a default so a config file may set any
/// subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory holding the monthly partition files.
    pub data_dir: PathBuf,
    /// File name prefix before `_<YYYY>-<MM>`.
    pub file_prefix: String,
    /// File extension without the dot.
    pub extension: String,
    /// Rows per record batch when scanning a partition.
    pub read_batch_size: usize,
    pub month_match: MonthMatch,
    /// Seed of the sampling hash.
    pub sample_seed: u64,
    /// Columns tried first as sampling hash inputs.
    pub sample_priority: Vec<String>,
    /// Months per chunk in `load_in_batches` when the caller gives none.
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/raw"),
            file_prefix: "fhvhv_tripdata".to_string(),
            extension: "parquet".to_string(),
            read_batch_size: 65_536,
            month_match: MonthMatch::default(),
            sample_seed: 42,
            sample_priority: DEFAULT_PRIORITY.iter().map(|c| c.to_string()).collect(),
            batch_size: 3,
        }
    }
}

impl LoaderConfig {
    /// Defaults pointed at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.is_empty() {
            return Err(LoaderError::Config("file_prefix must not be empty".into()));
        }
        if self.read_batch_size == 0 {
            return Err(LoaderError::Config("read_batch_size must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(LoaderError::InvalidBatchSize);
        }
        Ok(())
    }

    /// Glob-like description of the partition file pattern, for messages.
    pub fn pattern(&self) -> String {
        format!("{}_<YYYY>-<MM>.{}", self.file_prefix, self.extension)
    }
}
