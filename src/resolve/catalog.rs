use std::collections::BTreeSet;

use log::debug;

use crate::error::{LoaderError, Result};
use crate::plan::expr::{col, lit, Expr};

// ---------------------------------------------------------------------------
// Feature – a named output column and how to derive it
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    /// Raw columns the derivation reads, in declaration order.
    pub requires: Vec<String>,
    /// Produces one column named `name`.
    pub derive: Expr,
}

impl Feature {
    /// `derive` is aliased to `name`.
    pub fn new(name: &str, requires: &[&str], derive: Expr) -> Self {
        Self {
            name: name.to_string(),
            requires: requires.iter().map(|c| c.to_string()).collect(),
            derive: derive.alias(name),
        }
    }

    /// Feature whose requirements are exactly the columns `derive` reads.
    pub fn derived(name: &str, derive: Expr) -> Self {
        Self {
            name: name.to_string(),
            requires: derive.columns().into_iter().collect(),
            derive: derive.alias(name),
        }
    }

    /// Feature that exposes a raw column under a new name.
    pub fn renamed(name: &str, column: &str) -> Self {
        Self::new(name, &[column], col(column))
    }
}

/// Data-quality gate applied before derivation when all of its columns are
/// part of the load.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningRule {
    pub requires: BTreeSet<String>,
    pub predicate: Expr,
}

impl CleaningRule {
    pub fn new(predicate: Expr) -> Self {
        Self {
            requires: predicate.columns(),
            predicate,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution – what a feature request turns into
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Columns to read, first-seen order, no duplicates.
    pub raw_columns: Vec<String>,
    /// One expression per derived output column, in request order.
    pub derivations: Vec<Expr>,
    /// Conjunction of the applicable cleaning rules.
    pub cleaning: Option<Expr>,
    /// Final columns, in request order.
    pub output_columns: Vec<String>,
}

/// Distinct names in first-seen order.
pub(crate) fn dedup_ordered<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// FeatureCatalog
// ---------------------------------------------------------------------------

/// Named features and cleaning rules. Built explicitly and passed to the
/// loader, so tests can use their own small catalogs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCatalog {
    features: Vec<Feature>,
    cleaning: Vec<CleaningRule>,
}

impl FeatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature; a later feature with the same name replaces the
    /// earlier one in place.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        match self.features.iter().position(|f| f.name == feature.name) {
            Some(i) => self.features[i] = feature,
            None => self.features.push(feature),
        }
        self
    }

    pub fn with_cleaning(mut self, rule: CleaningRule) -> Self {
        self.cleaning.push(rule);
        self
    }

    /// Features of the NYC TLC high-volume FHV trip records.
    pub fn tlc() -> Self {
        Self::new()
            .with_feature(Feature::renamed("pickup_datetime", "pickup_datetime"))
            .with_feature(Feature::derived("pickup_hour", col("pickup_datetime").hour()))
            .with_feature(Feature::derived(
                "pickup_dayofweek",
                col("pickup_datetime").weekday(),
            ))
            .with_feature(Feature::derived("pickup_date", col("pickup_datetime").date()))
            .with_feature(Feature::renamed("pickup_zone", "PULocationID"))
            .with_feature(Feature::renamed("dropoff_zone", "DOLocationID"))
            .with_feature(Feature::renamed("trip_distance", "trip_miles"))
            .with_feature(Feature::renamed("trip_duration", "trip_time"))
            .with_feature(Feature::renamed("fare", "base_passenger_fare"))
            .with_feature(Feature::new(
                "avg_price_per_mile",
                &["base_passenger_fare", "trip_miles"],
                col("base_passenger_fare") / col("trip_miles"),
            ))
            .with_cleaning(CleaningRule::new(
                col("trip_miles").gt(lit(0.0)).and(col("trip_miles").lt(lit(100.0))),
            ))
            .with_cleaning(CleaningRule::new(col("base_passenger_fare").gt(lit(0.0))))
            .with_cleaning(CleaningRule::new(col("trip_time").gt(lit(0))))
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Resolve requested feature names to the columns to read and the
    /// expressions that produce them. Reads no data.
    pub fn resolve(&self, features: &[String]) -> Result<Resolution> {
        let unknown: Vec<String> = features
            .iter()
            .filter(|f| self.get(f).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(LoaderError::UnknownFeature {
                unknown: dedup_ordered(&unknown),
                available: self.names(),
            });
        }

        let output_columns = dedup_ordered(features);
        let resolved: Vec<&Feature> = output_columns
            .iter()
            .filter_map(|name| self.get(name))
            .collect();

        let raw_columns = dedup_ordered(resolved.iter().flat_map(|f| f.requires.iter()));
        let derivations = resolved.iter().map(|f| f.derive.clone()).collect();

        let available: BTreeSet<&str> = raw_columns.iter().map(String::as_str).collect();
        let cleaning = Expr::conjunction(
            self.cleaning
                .iter()
                .filter(|rule| rule.requires.iter().all(|c| available.contains(c.as_str())))
                .map(|rule| rule.predicate.clone()),
        );

        debug!("Resolved {output_columns:?} to raw columns {raw_columns:?}");
        Ok(Resolution {
            raw_columns,
            derivations,
            cleaning,
            output_columns,
        })
    }
}
