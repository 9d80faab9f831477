//! Month-chunked loading for date ranges that do not fit in memory at once.

use arrow::record_batch::RecordBatch;
use log::info;

use crate::config::MonthMatch;
use crate::data::filter::{month_keys, PartitionSelector};
use crate::data::loader::Loader;
use crate::error::{LoaderError, Result};
use crate::plan::logical::{concat_unified, unify_schemas};

/// Runs one load per chunk of months, in order, and concatenates the
/// results. Only the finished chunk tables are kept between iterations.
#[derive(Debug, Clone, Copy)]
pub struct BatchOrchestrator<'a> {
    loader: &'a Loader,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(loader: &'a Loader) -> Self {
        Self { loader }
    }

    /// Months to process: the given list, or every discovered month
    /// ascending when it is absent or empty.
    pub fn months(&self, months: Option<&[String]>) -> Vec<String> {
        match months {
            Some(months) if !months.is_empty() => months.to_vec(),
            _ => month_keys(self.loader.partitions()),
        }
    }

    fn derives_months(months: Option<&[String]>) -> bool {
        months.map_or(true, <[String]>::is_empty)
    }

    /// Split `months` into consecutive chunks of at most `batch_size`.
    pub fn chunks(months: &[String], batch_size: usize) -> Result<Vec<Vec<String>>> {
        if batch_size == 0 {
            return Err(LoaderError::InvalidBatchSize);
        }
        Ok(months.chunks(batch_size).map(<[String]>::to_vec).collect())
    }

    pub fn run(
        &self,
        features: &[String],
        months: Option<&[String]>,
        batch_size: usize,
        sample_ratio: f64,
    ) -> Result<RecordBatch> {
        let chunks = Self::chunks(&self.months(months), batch_size)?;
        let prepared = self.loader.prepare(features, sample_ratio)?;
        // Derived months are exact keys; each partition lands in one chunk.
        let selector = if Self::derives_months(months) {
            PartitionSelector::new(MonthMatch::Exact)
        } else {
            *self.loader.selector()
        };

        let total = chunks.len();
        let mut tables = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            info!("Processing batch {}/{}: {:?}", i + 1, total, chunk);
            let plan = self.loader.plan(&prepared, Some(chunk.as_slice()), &selector)?;
            let table = self.loader.engine().collect(&plan)?;
            info!("Batch {} completed: {} rows", i + 1, table.num_rows());
            tables.push(table);
        }

        info!("Merging {} batches", tables.len());
        let labelled: Vec<(String, _)> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("batch {}", i + 1), t.schema()))
            .collect();
        let schema = match unify_schemas(&labelled)? {
            Some(schema) => schema,
            None => self.loader.plan(&prepared, None, &selector)?.schema(),
        };
        let merged = concat_unified(&schema, &tables)?;
        info!("Final dataset: {} rows", merged.num_rows());
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn months(names: &[&str]) -> Vec<String> {
        names.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_chunks_keep_order() {
        let all = months(&["2023-01", "2023-02", "2023-03", "2023-04", "2023-05"]);
        let chunks = BatchOrchestrator::chunks(&all, 2).unwrap();
        assert_eq!(
            chunks,
            vec![
                months(&["2023-01", "2023-02"]),
                months(&["2023-03", "2023-04"]),
                months(&["2023-05"]),
            ]
        );
    }

    #[test]
    fn test_chunk_larger_than_list() {
        let all = months(&["2023-01", "2023-02"]);
        assert_eq!(BatchOrchestrator::chunks(&all, 10).unwrap(), vec![all.clone()]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let all = months(&["2023-01"]);
        assert!(matches!(
            BatchOrchestrator::chunks(&all, 0),
            Err(LoaderError::InvalidBatchSize)
        ));
    }
}
