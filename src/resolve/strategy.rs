use std::collections::BTreeSet;

use super::catalog::{dedup_ordered, FeatureCatalog, Resolution};
use crate::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// ResolutionStrategy – feature list → (columns to read, post-read transform)
// ---------------------------------------------------------------------------

/// Turns requested names into a [`Resolution`]. Implementations hold no
/// mutable state and can be shared across threads.
pub trait ResolutionStrategy: Send + Sync + std::fmt::Debug {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    /// Names a caller may request. `None` means "the dataset's raw columns".
    fn feature_names(&self) -> Option<Vec<String>>;

    /// Resolve without touching any data.
    fn resolve(&self, features: &[String]) -> Result<Resolution>;

    /// Check a resolution against the raw columns discovered in the dataset.
    fn validate(&self, resolution: &Resolution, raw_columns: &[String]) -> Result<()> {
        let known: BTreeSet<&str> = raw_columns.iter().map(String::as_str).collect();
        let missing: Vec<String> = resolution
            .raw_columns
            .iter()
            .filter(|c| !known.contains(c.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoaderError::UnknownColumn {
                missing,
                available: raw_columns.to_vec(),
            })
        }
    }
}

/// Requested names are raw storage columns, loaded as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawColumnStrategy;

impl ResolutionStrategy for RawColumnStrategy {
    fn name(&self) -> &'static str {
        "raw-column"
    }

    fn feature_names(&self) -> Option<Vec<String>> {
        None
    }

    fn resolve(&self, features: &[String]) -> Result<Resolution> {
        let columns = dedup_ordered(features);
        Ok(Resolution {
            raw_columns: columns.clone(),
            derivations: Vec::new(),
            cleaning: None,
            output_columns: columns,
        })
    }
}

/// Requested names are catalog features, derived from raw columns after
/// the catalog's cleaning rules.
#[derive(Debug, Clone)]
pub struct CatalogDerivationStrategy {
    catalog: FeatureCatalog,
}

impl CatalogDerivationStrategy {
    pub fn new(catalog: FeatureCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }
}

impl Default for CatalogDerivationStrategy {
    fn default() -> Self {
        Self::new(FeatureCatalog::tlc())
    }
}

impl ResolutionStrategy for CatalogDerivationStrategy {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn feature_names(&self) -> Option<Vec<String>> {
        Some(self.catalog.names())
    }

    fn resolve(&self, features: &[String]) -> Result<Resolution> {
        self.catalog.resolve(features)
    }
}
