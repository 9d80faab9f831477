//! Executes deferred plans against Parquet partition files.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;

use crate::data::model::Partition;
use crate::error::{LoaderError, Result};
use crate::plan::logical::{concat_unified, unify_schemas, PartitionPlan, QueryPlan};

// ---------------------------------------------------------------------------
// Engine seam
// ---------------------------------------------------------------------------

/// Columnar engine the loader hands its plans to. Calls are synchronous.
pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    /// Column names and types of a partition, without reading row data.
    fn schema(&self, partition: &Partition) -> Result<SchemaRef>;

    /// Run the plan to completion and return every row as one batch.
    fn collect(&self, plan: &QueryPlan) -> Result<RecordBatch>;
}

// ---------------------------------------------------------------------------
// ParquetEngine
// ---------------------------------------------------------------------------

/// Reads partitions with column projection pushed into the Parquet reader,
/// then runs each plan's steps batch by batch.
#[derive(Debug, Clone)]
pub struct ParquetEngine {
    batch_size: usize,
}

impl Default for ParquetEngine {
    fn default() -> Self {
        Self::new(65_536)
    }
}

impl ParquetEngine {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    fn open(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(path)?;
        Ok(ParquetRecordBatchReaderBuilder::try_new(file)?)
    }

    /// Scan one partition and push every record batch through its steps.
    fn run_partition(&self, plan: &PartitionPlan) -> Result<Vec<RecordBatch>> {
        let builder = Self::open(&plan.partition.path)?;
        let file_schema = builder.schema().clone();
        let indices = plan
            .scan
            .iter()
            .map(|c| {
                file_schema.index_of(c).map_err(|_| {
                    LoaderError::schema_mismatch(format!(
                        "{} no longer has column {c:?}",
                        plan.partition.file_name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()?;

        // The reader yields projected columns in file order; restore scan order.
        let read_schema = reader.schema();
        let order = plan
            .scan
            .iter()
            .map(|c| read_schema.index_of(c))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        for batch in reader {
            let batch = batch?.project(&order)?;
            let batch = plan.apply_steps(batch)?;
            if batch.num_rows() > 0 {
                out.push(batch);
            }
        }
        Ok(out)
    }
}

impl ExecutionEngine for ParquetEngine {
    fn schema(&self, partition: &Partition) -> Result<SchemaRef> {
        Ok(Self::open(&partition.path)?.schema().clone())
    }

    fn collect(&self, plan: &QueryPlan) -> Result<RecordBatch> {
        let schema = plan.schema();
        let mut batches = Vec::new();
        for input in plan.inputs() {
            let label = input.partition.file_name();
            let produced = self.run_partition(input)?;
            for batch in &produced {
                unify_schemas(&[
                    ("plan".to_string(), schema.clone()),
                    (label.clone(), batch.schema()),
                ])?;
            }
            debug!(
                "{label}: {} rows",
                produced.iter().map(RecordBatch::num_rows).sum::<usize>()
            );
            batches.extend(produced);
        }
        concat_unified(&schema, &batches)
    }
}

// ---------------------------------------------------------------------------
// DeferredPlan – a plan bound to the engine that will run it
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeferredPlan {
    plan: QueryPlan,
    engine: Arc<dyn ExecutionEngine>,
}

impl DeferredPlan {
    pub fn new(plan: QueryPlan, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { plan, engine }
    }

    pub fn schema(&self) -> SchemaRef {
        self.plan.schema()
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Human-readable plan.
    pub fn explain(&self) -> String {
        self.plan.to_string()
    }

    pub fn collect(&self) -> Result<RecordBatch> {
        self.engine.collect(&self.plan)
    }
}
