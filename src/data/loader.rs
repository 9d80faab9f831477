use std::sync::{Arc, OnceLock};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use log::{debug, info};

use super::discover::discover_partitions;
use super::filter::PartitionSelector;
use super::model::Partition;
use crate::batch::BatchOrchestrator;
use crate::config::LoaderConfig;
use crate::engine::{DeferredPlan, ExecutionEngine, ParquetEngine};
use crate::error::{LoaderError, Result};
use crate::plan::expr::Expr;
use crate::plan::logical::QueryPlan;
use crate::plan::{QueryPlanBuilder, Sampler};
use crate::resolve::catalog::dedup_ordered;
use crate::resolve::{
    CatalogDerivationStrategy, FeatureCatalog, RawColumnStrategy, Resolution, ResolutionStrategy,
};

// ---------------------------------------------------------------------------
// Load options / output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Month tokens; `None` or empty loads every partition.
    pub months: Option<Vec<String>>,
    /// Fraction of rows kept, `0 < ratio <= 1`.
    pub sample_ratio: f64,
    /// `false` returns the plan instead of running it.
    pub collect: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            months: None,
            sample_ratio: 1.0,
            collect: true,
        }
    }
}

impl LoadOptions {
    pub fn months<S: AsRef<str>>(mut self, months: &[S]) -> Self {
        self.months = Some(months.iter().map(|m| m.as_ref().to_string()).collect());
        self
    }

    pub fn sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.collect = false;
        self
    }
}

/// Result of [`Loader::load`]: rows, or a plan still to be run.
#[derive(Debug, Clone)]
pub enum LoadOutput {
    Table(RecordBatch),
    Deferred(DeferredPlan),
}

impl LoadOutput {
    pub fn schema(&self) -> SchemaRef {
        match self {
            LoadOutput::Table(batch) => batch.schema(),
            LoadOutput::Deferred(plan) => plan.schema(),
        }
    }

    /// Rows of the load, running the plan if it was deferred.
    pub fn collect(self) -> Result<RecordBatch> {
        match self {
            LoadOutput::Table(batch) => Ok(batch),
            LoadOutput::Deferred(plan) => plan.collect(),
        }
    }

    pub fn as_deferred(&self) -> Option<&DeferredPlan> {
        match self {
            LoadOutput::Table(_) => None,
            LoadOutput::Deferred(plan) => Some(plan),
        }
    }
}

/// A validated request: what to read and how to sample it. Built without
/// any I/O.
#[derive(Debug, Clone)]
pub(crate) struct Prepared {
    pub resolution: Resolution,
    pub sample: Option<Expr>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Entry point: discovers the monthly partitions once, then turns feature
/// requests into plans over them.
#[derive(Debug)]
pub struct Loader {
    config: LoaderConfig,
    partitions: Vec<Partition>,
    strategy: Box<dyn ResolutionStrategy>,
    engine: Arc<dyn ExecutionEngine>,
    selector: PartitionSelector,
    sampler: Sampler,
    builder: QueryPlanBuilder,
    raw_columns: OnceLock<Vec<String>>,
}

impl Loader {
    /// Discover partitions under `config.data_dir` and read them with the
    /// Parquet engine.
    pub fn new(config: LoaderConfig, strategy: Box<dyn ResolutionStrategy>) -> Result<Self> {
        config.validate()?;
        let partitions =
            discover_partitions(&config.data_dir, &config.file_prefix, &config.extension)?;
        let engine = Arc::new(ParquetEngine::new(config.read_batch_size));
        Self::from_partitions(config, partitions, strategy, engine)
    }

    /// Requested names are raw columns.
    pub fn raw(config: LoaderConfig) -> Result<Self> {
        Self::new(config, Box::new(RawColumnStrategy))
    }

    /// Requested names are features of `catalog`.
    pub fn with_catalog(config: LoaderConfig, catalog: FeatureCatalog) -> Result<Self> {
        Self::new(config, Box::new(CatalogDerivationStrategy::new(catalog)))
    }

    /// Build over an explicit partition list and engine.
    pub fn from_partitions(
        config: LoaderConfig,
        partitions: Vec<Partition>,
        strategy: Box<dyn ResolutionStrategy>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Result<Self> {
        if partitions.is_empty() {
            return Err(LoaderError::NoPartitionsFound {
                dir: config.data_dir.clone(),
                pattern: config.pattern(),
            });
        }
        info!(
            "Loader ready: {} monthly partition(s), {} resolution",
            partitions.len(),
            strategy.name()
        );
        Ok(Self {
            selector: PartitionSelector::new(config.month_match),
            sampler: Sampler::new(config.sample_seed).with_priority(config.sample_priority.clone()),
            builder: QueryPlanBuilder::new(),
            raw_columns: OnceLock::new(),
            config,
            partitions,
            strategy,
            engine,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Discovered partitions, sorted by path.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn strategy(&self) -> &dyn ResolutionStrategy {
        self.strategy.as_ref()
    }

    pub(crate) fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    /// Column names of the first partition. Read once, then cached.
    pub fn raw_columns(&self) -> Result<&[String]> {
        if let Some(columns) = self.raw_columns.get() {
            return Ok(columns);
        }
        let first = self.first_partition()?;
        let schema = self.engine.schema(first)?;
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        debug!("Raw columns of {first}: {columns:?}");
        Ok(self.raw_columns.get_or_init(|| columns))
    }

    fn first_partition(&self) -> Result<&Partition> {
        self.partitions
            .first()
            .ok_or_else(|| LoaderError::NoPartitionsFound {
                dir: self.config.data_dir.clone(),
                pattern: self.config.pattern(),
            })
    }

    /// Names that may be passed to [`Loader::load`].
    pub fn list_features(&self) -> Result<Vec<String>> {
        match self.strategy.feature_names() {
            Some(names) => Ok(names),
            None => Ok(self.raw_columns()?.to_vec()),
        }
    }

    /// Resolve `features` and build the sampling predicate. No I/O.
    pub(crate) fn prepare(&self, features: &[String], sample_ratio: f64) -> Result<Prepared> {
        let resolution = self.strategy.resolve(features)?;
        Sampler::validate_ratio(sample_ratio)?;
        let candidates = dedup_ordered(
            resolution
                .raw_columns
                .iter()
                .chain(resolution.output_columns.iter()),
        );
        let sample = self.sampler.predicate(sample_ratio, &candidates)?;
        Ok(Prepared { resolution, sample })
    }

    pub(crate) fn selector(&self) -> &PartitionSelector {
        &self.selector
    }

    /// Deferred plan over the partitions `selector` picks for `months`.
    pub(crate) fn plan(
        &self,
        prepared: &Prepared,
        months: Option<&[String]>,
        selector: &PartitionSelector,
    ) -> Result<QueryPlan> {
        let Prepared { resolution, sample } = prepared;
        self.strategy.validate(resolution, self.raw_columns()?)?;

        info!("Loading columns: {:?}", resolution.raw_columns);
        let selected = selector.select(&self.partitions, months);
        if selected.is_empty() {
            return Ok(QueryPlan::empty(self.template_schema(prepared)?));
        }

        let plans = selected
            .iter()
            .map(|partition| {
                let schema = self.engine.schema(partition)?;
                self.builder.build(partition, schema, resolution, sample.as_ref())
            })
            .collect::<Result<Vec<_>>>()?;
        let plan = QueryPlan::union(plans)?;
        debug!("Ready columns: {:?}", resolution.output_columns);
        Ok(plan)
    }

    /// Output schema of a request, taken from the first partition.
    fn template_schema(&self, prepared: &Prepared) -> Result<SchemaRef> {
        let first = self.first_partition()?;
        let schema = self.engine.schema(first)?;
        self.builder
            .build(first, schema, &prepared.resolution, prepared.sample.as_ref())?
            .output_schema()
    }

    /// Load `features` for the months in `options`.
    ///
    /// Unknown names fail before any partition is opened. A month list that
    /// matches nothing yields zero rows with the request's columns.
    pub fn load<S: AsRef<str>>(&self, features: &[S], options: &LoadOptions) -> Result<LoadOutput> {
        let features = owned(features);
        let prepared = self.prepare(&features, options.sample_ratio)?;
        let plan = self.plan(&prepared, options.months.as_deref(), &self.selector)?;

        if !options.collect {
            return Ok(LoadOutput::Deferred(DeferredPlan::new(plan, self.engine.clone())));
        }
        let table = self.engine.collect(&plan)?;
        info!("Loaded {} rows x {} columns", table.num_rows(), table.num_columns());
        Ok(LoadOutput::Table(table))
    }

    /// Load month chunks one after another and concatenate the results in
    /// chunk order. With `months` omitted the chunks follow the discovered
    /// months, which gives the same rows as a single [`Loader::load`].
    pub fn load_in_batches<S: AsRef<str>>(
        &self,
        features: &[S],
        months: Option<&[String]>,
        batch_size: usize,
        sample_ratio: f64,
    ) -> Result<RecordBatch> {
        BatchOrchestrator::new(self).run(&owned(features), months, batch_size, sample_ratio)
    }
}

fn owned<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|n| n.as_ref().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{write_month, SyntheticMonth};
    use arrow::datatypes::TimeUnit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts footer reads so tests can check what touched the disk.
    #[derive(Debug, Default)]
    struct CountingEngine {
        inner: ParquetEngine,
        schema_reads: AtomicUsize,
    }

    impl ExecutionEngine for CountingEngine {
        fn schema(&self, partition: &Partition) -> Result<SchemaRef> {
            self.schema_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.schema(partition)
        }

        fn collect(&self, plan: &QueryPlan) -> Result<RecordBatch> {
            self.inner.collect(plan)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        loader: Loader,
        engine: Arc<CountingEngine>,
    }

    fn fixture(months: &[&str]) -> Fixture {
        fixture_with(months, |_| {})
    }

    fn fixture_with(months: &[&str], tweak: impl FnOnce(&mut LoaderConfig)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoaderConfig::new(dir.path());
        tweak(&mut config);
        let mut partitions = Vec::new();
        for month in months {
            let path = write_month(
                dir.path(),
                &config.file_prefix,
                &SyntheticMonth::new(month, 40, TimeUnit::Nanosecond),
            )
            .unwrap();
            partitions.push(Partition::new(path, *month));
        }
        let engine = Arc::new(CountingEngine::default());
        let loader = Loader::from_partitions(
            config,
            partitions,
            Box::new(CatalogDerivationStrategy::default()),
            engine.clone(),
        )
        .unwrap();
        Fixture {
            _dir: dir,
            loader,
            engine,
        }
    }

    #[test]
    fn test_raw_columns_read_once() {
        let fx = fixture(&["2023-01", "2023-02"]);
        let first = fx.loader.raw_columns().unwrap().to_vec();
        let second = fx.loader.raw_columns().unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(first[0], "hvfhs_license_num");
        assert_eq!(fx.engine.schema_reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_feature_fails_before_io() {
        let fx = fixture(&["2023-01"]);
        let err = fx
            .loader
            .load(&["pickup_hour", "bogus_feature"], &LoadOptions::default())
            .unwrap_err();
        match err {
            LoaderError::UnknownFeature { unknown, .. } => {
                assert_eq!(unknown, vec!["bogus_feature".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.engine.schema_reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bad_ratio_fails_before_io() {
        let fx = fixture(&["2023-01"]);
        for ratio in [0.0, -0.5, 1.5, f64::NAN] {
            let err = fx
                .loader
                .load(&["fare"], &LoadOptions::default().sample_ratio(ratio))
                .unwrap_err();
            assert!(matches!(err, LoaderError::InvalidRatio(_)));
        }
        assert_eq!(fx.engine.schema_reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_deferred_load_reads_only_footers() {
        let fx = fixture(&["2023-01", "2023-02"]);
        let out = fx
            .loader
            .load(&["fare"], &LoadOptions::default().deferred())
            .unwrap();
        let plan = out.as_deferred().unwrap();
        assert_eq!(plan.plan().inputs().len(), 2);
        assert_eq!(plan.schema().field(0).name(), "fare");
        // raw columns + one per selected partition
        assert_eq!(fx.engine.schema_reads.load(Ordering::SeqCst), 3);
        assert_eq!(out.collect().unwrap().num_columns(), 1);
    }

    #[test]
    fn test_sample_priority_from_config() {
        let fx = fixture_with(&["2023-01"], |c| c.sample_priority = vec!["PULocationID".into()]);
        let out = fx
            .loader
            .load(
                &["fare", "pickup_zone"],
                &LoadOptions::default().sample_ratio(0.5).deferred(),
            )
            .unwrap();
        let explain = out.as_deferred().unwrap().explain();
        assert!(explain.contains(r#"col("PULocationID").hash(42)"#), "{explain}");
        assert!(!explain.contains(r#"col("base_passenger_fare").hash(42)"#), "{explain}");
    }

    #[test]
    fn test_list_features_is_catalog() {
        let fx = fixture(&["2023-01"]);
        let names = fx.loader.list_features().unwrap();
        assert_eq!(names, FeatureCatalog::tlc().names());
    }

    #[test]
    fn test_empty_partition_list_rejected() {
        let err = Loader::from_partitions(
            LoaderConfig::new("/nowhere"),
            Vec::new(),
            Box::new(RawColumnStrategy),
            Arc::new(ParquetEngine::default()),
        )
        .unwrap_err();
        assert!(matches!(err, LoaderError::NoPartitionsFound { .. }));
    }
}
