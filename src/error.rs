//! Error type for the loader.

use std::path::PathBuf;

use thiserror::Error;

/// How many valid names an "unknown name" error lists.
pub const SUGGESTION_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("no partitions matching {pattern} found under {}", .dir.display())]
    NoPartitionsFound { dir: PathBuf, pattern: String },

    #[error("unknown feature(s) {unknown:?}; available: {}", suggest(.available))]
    UnknownFeature {
        unknown: Vec<String>,
        available: Vec<String>,
    },

    #[error("column(s) not found {missing:?}; available: {}", suggest(.available))]
    UnknownColumn {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("sample ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid expression: {0}")]
    InvalidExpr(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoaderError {
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn invalid_expr(msg: impl Into<String>) -> Self {
        Self::InvalidExpr(msg.into())
    }
}

/// Render the first [`SUGGESTION_LIMIT`] names, marking truncation.
fn suggest(names: &[String]) -> String {
    if names.len() > SUGGESTION_LIMIT {
        format!("{:?}...", &names[..SUGGESTION_LIMIT])
    } else {
        format!("{names:?}")
    }
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
