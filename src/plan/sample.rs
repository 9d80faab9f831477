//! Deterministic, hash-based row sampling.
//!
//! Inclusion is decided from the row's own values, so the same rows are kept
//! on every run and in every batch without any coordination.

use super::expr::{col, lit, Expr};
use crate::error::{LoaderError, Result};

/// Columns tried first as hash inputs; they are loaded by most requests
/// and spread well.
pub const DEFAULT_PRIORITY: [&str; 4] = [
    "trip_miles",
    "base_passenger_fare",
    "PULocationID",
    "pickup_datetime",
];

const BUCKETS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub seed: u64,
    pub priority: Vec<String>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(42)
    }
}

impl Sampler {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            priority: DEFAULT_PRIORITY.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_priority(mut self, priority: Vec<String>) -> Self {
        self.priority = priority;
        self
    }

    /// Fail unless `0 < ratio <= 1`.
    pub fn validate_ratio(ratio: f64) -> Result<()> {
        if ratio > 0.0 && ratio <= 1.0 {
            Ok(())
        } else {
            Err(LoaderError::InvalidRatio(ratio))
        }
    }

    /// Rows whose bucket falls below this are kept.
    pub fn threshold(ratio: f64) -> u64 {
        (ratio * BUCKETS as f64).round() as u64
    }

    /// Columns the predicate hashes: up to two priority columns present in
    /// `columns`, otherwise the first of `columns`.
    pub fn hash_columns<'a>(&'a self, columns: &'a [String]) -> Vec<&'a str> {
        let picked: Vec<&str> = self
            .priority
            .iter()
            .filter(|p| columns.contains(p))
            .take(2)
            .map(String::as_str)
            .collect();
        if picked.is_empty() {
            columns.first().map(String::as_str).into_iter().collect()
        } else {
            picked
        }
    }

    /// Inclusion predicate for `ratio` over rows exposing `columns`.
    /// `None` means keep everything (`ratio == 1.0`).
    pub fn predicate(&self, ratio: f64, columns: &[String]) -> Result<Option<Expr>> {
        Self::validate_ratio(ratio)?;
        if ratio >= 1.0 {
            return Ok(None);
        }
        let hashed = self.hash_columns(columns);
        let hash = hashed
            .iter()
            .map(|c| col(*c).hash(self.seed))
            .reduce(|acc, h| acc + h)
            .ok_or_else(|| LoaderError::invalid_expr("sampling needs at least one column"))?;
        Ok(Some(
            (hash % lit(BUCKETS)).lt(lit(Self::threshold(ratio))),
        ))
    }
}
