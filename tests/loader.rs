use std::path::Path;

use arrow::array::AsArray;
use arrow::datatypes::{DataType, Float64Type, Int32Type, TimeUnit};
use arrow::record_batch::RecordBatch;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tlc_loader::data::synthetic::{write_month, SyntheticMonth};
use tlc_loader::{FeatureCatalog, LoadOptions, Loader, LoaderConfig, LoaderError, MonthMatch};

const ROWS: usize = 200;

/// One partition per month, alternating ns/µs storage, every 10th trip
/// invalid.
fn dataset(months: &[&str]) -> (TempDir, Vec<RecordBatch>) {
    let dir = tempfile::tempdir().unwrap();
    let prefix = LoaderConfig::default().file_prefix;
    let mut written = Vec::new();
    for (i, month) in months.iter().enumerate() {
        let unit = if i % 2 == 0 {
            TimeUnit::Nanosecond
        } else {
            TimeUnit::Microsecond
        };
        let trips = SyntheticMonth::new(month, ROWS, unit).with_invalid_every(10);
        write_month(dir.path(), &prefix, &trips).unwrap();
        written.push(trips.batch().unwrap());
    }
    (dir, written)
}

fn catalog_loader(dir: &Path) -> Loader {
    Loader::with_catalog(LoaderConfig::new(dir), FeatureCatalog::tlc()).unwrap()
}

fn positive_fares(batches: &[RecordBatch]) -> usize {
    batches
        .iter()
        .map(|b| {
            let idx = b.schema().index_of("base_passenger_fare").unwrap();
            b.column(idx)
                .as_primitive::<Float64Type>()
                .values()
                .iter()
                .filter(|v| **v > 0.0)
                .count()
        })
        .sum()
}

fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch.schema().fields().iter().map(|f| f.name().clone()).collect()
}

#[test]
fn pickup_hour_and_fare_over_two_months() {
    let (dir, written) = dataset(&["2023-01", "2023-02"]);
    let loader = catalog_loader(dir.path());

    let table = loader
        .load(
            &["pickup_hour", "fare"],
            &LoadOptions::default().months(&["2023-01", "2023-02"]),
        )
        .unwrap()
        .collect()
        .unwrap();

    assert_eq!(column_names(&table), vec!["pickup_hour", "fare"]);
    assert_eq!(table.num_rows(), positive_fares(&written));

    let hours = table.column(0).as_primitive::<Int32Type>();
    assert!(hours.iter().flatten().all(|h| (0..=23).contains(&h)));
    let fares = table.column(1).as_primitive::<Float64Type>();
    assert!(fares.iter().flatten().all(|f| f > 0.0));
}

#[test]
fn mixed_precision_partitions_load_as_microseconds() {
    let (dir, _) = dataset(&["2023-01", "2023-02"]);
    let loader = Loader::raw(LoaderConfig::new(dir.path())).unwrap();

    let table = loader
        .load(&["pickup_datetime", "trip_miles"], &LoadOptions::default())
        .unwrap()
        .collect()
        .unwrap();

    // raw names carry no cleaning rules
    assert_eq!(table.num_rows(), 2 * ROWS);
    assert_eq!(
        table.schema().field(0).data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, None)
    );
}

#[test]
fn unknown_feature_is_rejected_without_reading_files() {
    let dir = tempfile::tempdir().unwrap();
    // not a Parquet file; opening it would fail
    std::fs::write(dir.path().join("fhvhv_tripdata_2023-01.parquet"), b"garbage").unwrap();
    let loader = catalog_loader(dir.path());

    let err = loader
        .load(&["pickup_hour", "bogus_feature"], &LoadOptions::default())
        .unwrap_err();
    match err {
        LoaderError::UnknownFeature { unknown, available } => {
            assert_eq!(unknown, vec!["bogus_feature".to_string()]);
            assert!(available.contains(&"pickup_hour".to_string()));
        }
        other => panic!("expected UnknownFeature, got {other}"),
    }

    let err = loader
        .load_in_batches(&["bogus_feature"], None, 2, 1.0)
        .unwrap_err();
    assert!(matches!(err, LoaderError::UnknownFeature { .. }));
}

#[test]
fn unknown_raw_column_lists_available_columns() {
    let (dir, _) = dataset(&["2023-01"]);
    let loader = Loader::raw(LoaderConfig::new(dir.path())).unwrap();

    let err = loader
        .load(&["trip_miles", "no_such_column"], &LoadOptions::default())
        .unwrap_err();
    match err {
        LoaderError::UnknownColumn { missing, available } => {
            assert_eq!(missing, vec!["no_such_column".to_string()]);
            assert!(available.contains(&"trip_miles".to_string()));
        }
        other => panic!("expected UnknownColumn, got {other}"),
    }
}

#[test]
fn empty_directory_has_no_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let err = Loader::raw(LoaderConfig::new(dir.path())).unwrap_err();
    assert!(matches!(err, LoaderError::NoPartitionsFound { .. }));
    assert!(err.to_string().contains("fhvhv_tripdata"));
}

#[test]
fn list_features_per_strategy() {
    let (dir, _) = dataset(&["2023-01"]);
    let catalog = catalog_loader(dir.path());
    assert_eq!(catalog.list_features().unwrap(), FeatureCatalog::tlc().names());

    let raw = Loader::raw(LoaderConfig::new(dir.path())).unwrap();
    let columns = raw.list_features().unwrap();
    assert_eq!(columns.first().map(String::as_str), Some("hvfhs_license_num"));
    assert!(columns.contains(&"base_passenger_fare".to_string()));
}

#[test]
fn batched_load_matches_single_load() {
    let (dir, _) = dataset(&["2023-01", "2023-02", "2023-03", "2023-04"]);
    let loader = catalog_loader(dir.path());
    let features = ["pickup_hour", "pickup_dayofweek", "fare", "avg_price_per_mile"];

    for ratio in [1.0, 0.3] {
        let single = loader
            .load(&features, &LoadOptions::default().sample_ratio(ratio))
            .unwrap()
            .collect()
            .unwrap();
        let batched = loader.load_in_batches(&features, None, 2, ratio).unwrap();
        assert_eq!(batched, single);
    }
}

#[test]
fn batched_load_under_month_named_directory() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("snapshot_2023-01");
    std::fs::create_dir(&dir).unwrap();
    let prefix = LoaderConfig::default().file_prefix;
    for month in ["2023-01", "2023-02", "2023-03", "2023-04"] {
        let trips = SyntheticMonth::new(month, 100, TimeUnit::Microsecond);
        write_month(&dir, &prefix, &trips).unwrap();
    }
    let loader = catalog_loader(&dir);

    let single = loader
        .load(&["fare"], &LoadOptions::default())
        .unwrap()
        .collect()
        .unwrap();
    let batched = loader.load_in_batches(&["fare"], None, 2, 1.0).unwrap();
    assert_eq!(single.num_rows(), 400);
    assert_eq!(batched, single);

    let january = loader
        .load(&["fare"], &LoadOptions::default().months(&["2023-01"]))
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(january.num_rows(), 100);
}

#[test]
fn batched_load_rejects_zero_batch_size() {
    let (dir, _) = dataset(&["2023-01"]);
    let loader = catalog_loader(dir.path());
    let err = loader.load_in_batches(&["fare"], None, 0, 1.0).unwrap_err();
    assert!(matches!(err, LoaderError::InvalidBatchSize));
}

#[test]
fn sampling_is_deterministic_and_a_subset() {
    let (dir, _) = dataset(&["2023-01", "2023-02"]);
    let options = LoadOptions::default().sample_ratio(0.5);

    let first = catalog_loader(dir.path())
        .load(&["fare", "trip_distance"], &options)
        .unwrap()
        .collect()
        .unwrap();
    let second = catalog_loader(dir.path())
        .load(&["fare", "trip_distance"], &options)
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(first, second);

    let full = catalog_loader(dir.path())
        .load(&["fare", "trip_distance"], &LoadOptions::default())
        .unwrap()
        .collect()
        .unwrap();
    assert!(first.num_rows() > 0);
    assert!(first.num_rows() < full.num_rows());
}

#[test]
fn deferred_plan_explains_and_collects() {
    let (dir, _) = dataset(&["2023-01", "2023-02"]);
    let loader = catalog_loader(dir.path());

    let eager = loader
        .load(&["pickup_date", "fare"], &LoadOptions::default())
        .unwrap()
        .collect()
        .unwrap();
    let deferred = loader
        .load(&["pickup_date", "fare"], &LoadOptions::default().deferred())
        .unwrap();
    let plan = deferred.as_deferred().unwrap();

    let explain = plan.explain();
    assert!(explain.starts_with("UNION (2 partitions)"));
    assert!(explain.contains("fhvhv_tripdata_2023-01.parquet"));
    assert_eq!(plan.schema().field(0).data_type(), &DataType::Date32);
    assert_eq!(plan.collect().unwrap(), eager);
}

#[test]
fn unmatched_months_yield_empty_table_with_schema() {
    let (dir, _) = dataset(&["2023-01"]);
    let loader = catalog_loader(dir.path());

    let table = loader
        .load(
            &["pickup_hour", "fare"],
            &LoadOptions::default().months(&["2031-07"]),
        )
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(table.num_rows(), 0);
    assert_eq!(column_names(&table), vec!["pickup_hour", "fare"]);
    assert_eq!(table.schema().field(0).data_type(), &DataType::Int32);
}

#[test]
fn exact_month_matching() {
    let (dir, _) = dataset(&["2023-01", "2023-02"]);

    let substring = catalog_loader(dir.path())
        .load(&["fare"], &LoadOptions::default().months(&["2023-0"]))
        .unwrap()
        .collect()
        .unwrap();

    let mut config = LoaderConfig::new(dir.path());
    config.month_match = MonthMatch::Exact;
    let exact_loader = Loader::with_catalog(config, FeatureCatalog::tlc()).unwrap();
    let exact = exact_loader
        .load(&["fare"], &LoadOptions::default().months(&["2023-0"]))
        .unwrap()
        .collect()
        .unwrap();
    let one = exact_loader
        .load(&["fare"], &LoadOptions::default().months(&["2023-02"]))
        .unwrap()
        .collect()
        .unwrap();

    assert_eq!(exact.num_rows(), 0);
    assert!(one.num_rows() > 0);
    assert!(substring.num_rows() > one.num_rows());
}
