//! Feature resolution: which raw columns a request needs and how the
//! requested outputs are computed from them.

pub mod catalog;
pub mod strategy;

pub use catalog::{CleaningRule, Feature, FeatureCatalog, Resolution};
pub use strategy::{CatalogDerivationStrategy, RawColumnStrategy, ResolutionStrategy};
