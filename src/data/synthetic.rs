//! Deterministic synthetic trip partitions for demos and tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;

use super::model::is_month_key;
use crate::error::{LoaderError, Result};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const LICENSES: [&str; 4] = ["HV0002", "HV0003", "HV0004", "HV0005"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

// ---------------------------------------------------------------------------
// SyntheticMonth
// ---------------------------------------------------------------------------

/// One month of generated trips.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMonth {
    /// `YYYY-MM`.
    pub month: String,
    pub rows: usize,
    /// Storage precision of the timestamp columns.
    pub unit: TimeUnit,
    pub seed: u64,
    /// Every n-th row gets `trip_miles = 0` and a negative fare.
    pub invalid_every: Option<usize>,
}

impl SyntheticMonth {
    pub fn new(month: &str, rows: usize, unit: TimeUnit) -> Self {
        Self {
            month: month.to_string(),
            rows,
            unit,
            seed: 42,
            invalid_every: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_invalid_every(mut self, n: usize) -> Self {
        self.invalid_every = Some(n.max(1));
        self
    }

    fn month_start_nanos(&self) -> Result<i64> {
        if !is_month_key(&self.month) {
            return Err(LoaderError::Config(format!("bad month key {:?}", self.month)));
        }
        let start = NaiveDate::parse_from_str(&format!("{}-01", self.month), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| LoaderError::Config(format!("bad month key {:?}", self.month)))?;
        Ok(start.and_utc().timestamp() * NANOS_PER_SEC)
    }

    /// Generate the month's rows.
    pub fn batch(&self) -> Result<RecordBatch> {
        let start = self.month_start_nanos()?;
        let mut rng = SimpleRng::new(self.seed ^ start as u64);
        let span = 28 * 86_400 * NANOS_PER_SEC as u64;

        let mut license = Vec::with_capacity(self.rows);
        let mut pickup = Vec::with_capacity(self.rows);
        let mut dropoff = Vec::with_capacity(self.rows);
        let mut pu = Vec::with_capacity(self.rows);
        let mut dol = Vec::with_capacity(self.rows);
        let mut miles = Vec::with_capacity(self.rows);
        let mut time = Vec::with_capacity(self.rows);
        let mut fare = Vec::with_capacity(self.rows);

        for i in 0..self.rows {
            let at = start + rng.below(span) as i64;
            let seconds = 60 + rng.below(3_600) as i64;
            let distance = ((0.3 + rng.next_f64() * 20.0) * 100.0).round() / 100.0;
            let price = ((2.5 + distance * 2.1 + rng.next_f64() * 5.0) * 100.0).round() / 100.0;
            let invalid = self.invalid_every.is_some_and(|n| i % n == 0);

            license.push(LICENSES[rng.below(LICENSES.len() as u64) as usize]);
            pickup.push(at);
            dropoff.push(at + seconds * NANOS_PER_SEC);
            pu.push(1 + rng.below(265) as i64);
            dol.push(1 + rng.below(265) as i64);
            miles.push(if invalid { 0.0 } else { distance });
            time.push(seconds);
            fare.push(if invalid { -price } else { price });
        }

        RecordBatch::try_new(
            trip_schema(self.unit),
            vec![
                Arc::new(StringArray::from(license)),
                timestamp_array(&pickup, self.unit),
                timestamp_array(&dropoff, self.unit),
                Arc::new(Int64Array::from(pu)),
                Arc::new(Int64Array::from(dol)),
                Arc::new(Float64Array::from(miles)),
                Arc::new(Int64Array::from(time)),
                Arc::new(Float64Array::from(fare)),
            ],
        )
        .map_err(Into::into)
    }
}

/// Raw columns of a high-volume FHV trip file.
pub fn trip_schema(unit: TimeUnit) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("hvfhs_license_num", DataType::Utf8, false),
        Field::new("pickup_datetime", DataType::Timestamp(unit, None), false),
        Field::new("dropoff_datetime", DataType::Timestamp(unit, None), false),
        Field::new("PULocationID", DataType::Int64, false),
        Field::new("DOLocationID", DataType::Int64, false),
        Field::new("trip_miles", DataType::Float64, false),
        Field::new("trip_time", DataType::Int64, false),
        Field::new("base_passenger_fare", DataType::Float64, false),
    ]))
}

fn timestamp_array(nanos: &[i64], unit: TimeUnit) -> ArrayRef {
    let scaled = |per_sec: i64| nanos.iter().map(move |v| v / (NANOS_PER_SEC / per_sec));
    match unit {
        TimeUnit::Second => Arc::new(TimestampSecondArray::from_iter_values(scaled(1))),
        TimeUnit::Millisecond => Arc::new(TimestampMillisecondArray::from_iter_values(scaled(1_000))),
        TimeUnit::Microsecond => {
            Arc::new(TimestampMicrosecondArray::from_iter_values(scaled(1_000_000)))
        }
        TimeUnit::Nanosecond => Arc::new(TimestampNanosecondArray::from(nanos.to_vec())),
    }
}

/// Write `month` to `<dir>/<prefix>_<month>.parquet`.
pub fn write_month(dir: &Path, prefix: &str, month: &SyntheticMonth) -> Result<PathBuf> {
    let batch = month.batch()?;
    let path = dir.join(format!("{prefix}_{}.parquet", month.month));
    let file = std::fs::File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::AsArray;
    use arrow::datatypes::{Float64Type, TimestampMicrosecondType};

    #[test]
    fn test_same_seed_same_rows() {
        let a = SyntheticMonth::new("2023-01", 100, TimeUnit::Microsecond).batch().unwrap();
        let b = SyntheticMonth::new("2023-01", 100, TimeUnit::Microsecond).batch().unwrap();
        assert_eq!(a, b);
        let c = SyntheticMonth::new("2023-01", 100, TimeUnit::Microsecond)
            .with_seed(7)
            .batch()
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_pickups_fall_inside_month() {
        let batch = SyntheticMonth::new("2023-02", 200, TimeUnit::Microsecond).batch().unwrap();
        let start = 1_675_209_600_000_000; // 2023-02-01T00:00:00Z
        let end = 1_677_628_800_000_000; // 2023-03-01T00:00:00Z
        let pickups = batch.column(1).as_primitive::<TimestampMicrosecondType>();
        assert!(pickups.values().iter().all(|t| (start..end).contains(t)));
    }

    #[test]
    fn test_invalid_rows() {
        let batch = SyntheticMonth::new("2023-01", 10, TimeUnit::Second)
            .with_invalid_every(5)
            .batch()
            .unwrap();
        let miles = batch.column(5).as_primitive::<Float64Type>();
        let zero: Vec<usize> = (0..10).filter(|&i| miles.value(i) == 0.0).collect();
        assert_eq!(zero, vec![0, 5]);
    }

    #[test]
    fn test_rejects_bad_month() {
        assert!(SyntheticMonth::new("2023-13", 1, TimeUnit::Second).batch().is_err());
    }
}
