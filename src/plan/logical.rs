use std::fmt;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::expr::Expr;
use crate::data::model::Partition;
use crate::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// Step – one stage applied to every record batch of a partition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Add or replace columns. Every expression sees the step's input, so
    /// expressions in one step cannot read each other's output.
    WithColumns(Vec<Expr>),
    /// Keep rows where the predicate is true (null counts as false).
    Filter(Expr),
    /// Keep exactly these columns, in this order.
    Select(Vec<String>),
}

impl Step {
    pub fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        match self {
            Step::WithColumns(exprs) => with_columns(batch, exprs),
            Step::Filter(predicate) => {
                let mask = predicate.evaluate_predicate(&batch)?;
                Ok(filter_record_batch(&batch, &mask)?)
            }
            Step::Select(columns) => select(&batch, columns),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::WithColumns(exprs) => {
                let exprs: Vec<String> = exprs.iter().map(Expr::to_string).collect();
                write!(f, "WITH_COLUMNS [{}]", exprs.join(", "))
            }
            Step::Filter(predicate) => write!(f, "FILTER {predicate}"),
            Step::Select(columns) => write!(f, "SELECT {columns:?}"),
        }
    }
}

fn with_columns(batch: RecordBatch, exprs: &[Expr]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    for expr in exprs {
        let name = expr
            .output_name()
            .ok_or_else(|| LoaderError::invalid_expr(format!("{expr} has no output name")))?;
        let array = expr.evaluate(&batch)?;
        let data_type = array.data_type().clone();

        match fields.iter().position(|f| f.name() == name) {
            Some(i) => {
                fields[i] = Arc::new(fields[i].as_ref().clone().with_data_type(data_type));
                columns[i] = array;
            }
            None => {
                fields.push(Arc::new(Field::new(name, data_type, true)));
                columns.push(array);
            }
        }
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

fn select(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = columns
        .iter()
        .map(|c| {
            schema
                .index_of(c)
                .map_err(|_| LoaderError::invalid_expr(format!("cannot select missing column {c:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

// ---------------------------------------------------------------------------
// PartitionPlan – deferred pipeline over a single partition file
// ---------------------------------------------------------------------------

/// Scan of one partition followed by ordered steps. Nothing is read until an
/// engine executes it.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionPlan {
    pub partition: Partition,
    /// Schema of the partition file at planning time.
    pub source_schema: SchemaRef,
    /// Columns read from the file, in this order.
    pub scan: Vec<String>,
    pub steps: Vec<Step>,
}

impl PartitionPlan {
    /// Start a plan that reads only `columns`. Every column must exist in
    /// the partition.
    pub fn scan(partition: Partition, source_schema: SchemaRef, columns: Vec<String>) -> Result<Self> {
        let missing: Vec<&String> = columns
            .iter()
            .filter(|c| source_schema.index_of(c).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::schema_mismatch(format!(
                "{} lacks column(s) {missing:?}",
                partition.file_name()
            )));
        }
        Ok(Self {
            partition,
            source_schema,
            scan: columns,
            steps: Vec::new(),
        })
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Indices of the scanned columns in the file schema, in scan order.
    pub fn scan_indices(&self) -> Result<Vec<usize>> {
        Ok(self
            .scan
            .iter()
            .map(|c| self.source_schema.index_of(c))
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn scan_schema(&self) -> Result<SchemaRef> {
        Ok(Arc::new(self.source_schema.project(&self.scan_indices()?)?))
    }

    /// Run every step over a scanned batch.
    pub fn apply_steps(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.steps.iter().try_fold(batch, |batch, step| step.apply(batch))
    }

    /// Output schema, found by pushing an empty batch through the steps.
    pub fn output_schema(&self) -> Result<SchemaRef> {
        let empty = RecordBatch::new_empty(self.scan_schema()?);
        Ok(self.apply_steps(empty)?.schema())
    }
}

impl fmt::Display for PartitionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  SCAN {} {:?}", self.partition.file_name(), self.scan)?;
        for step in &self.steps {
            writeln!(f, "    {step}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// QueryPlan – ordered union of partition plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    inputs: Vec<PartitionPlan>,
    schema: SchemaRef,
}

impl QueryPlan {
    /// Union the plans in order. Fails with `SchemaMismatch` when two inputs
    /// disagree on output column names or types.
    pub fn union(inputs: Vec<PartitionPlan>) -> Result<Self> {
        let labelled = inputs
            .iter()
            .map(|p| Ok((p.partition.file_name(), p.output_schema()?)))
            .collect::<Result<Vec<_>>>()?;
        let schema = unify_schemas(&labelled)?
            .ok_or_else(|| LoaderError::invalid_expr("union of zero partitions"))?;
        Ok(Self { inputs, schema })
    }

    /// A plan that produces no rows with the given schema.
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            inputs: Vec::new(),
            schema,
        }
    }

    pub fn inputs(&self) -> &[PartitionPlan] {
        &self.inputs
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<String> = self
            .schema
            .fields()
            .iter()
            .map(|field| format!("{}: {}", field.name(), field.data_type()))
            .collect();
        writeln!(
            f,
            "UNION ({} partitions) -> [{}]",
            self.inputs.len(),
            columns.join(", ")
        )?;
        for input in &self.inputs {
            write!(f, "{input}")?;
        }
        Ok(())
    }
}

/// Check that all schemas agree on column names and types, in order.
/// Nullability of the result is the union of the inputs'. `None` when there
/// is nothing to unify.
pub fn unify_schemas(labelled: &[(String, SchemaRef)]) -> Result<Option<SchemaRef>> {
    let Some((first_label, first)) = labelled.first() else {
        return Ok(None);
    };
    let mut fields: Vec<Field> = first
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), f.data_type().clone(), f.is_nullable()))
        .collect();

    for (label, schema) in &labelled[1..] {
        let names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();
        let expected: Vec<&String> = fields.iter().map(|f| f.name()).collect();
        if names != expected {
            return Err(LoaderError::schema_mismatch(format!(
                "{label} has columns {names:?}, {first_label} has {expected:?}"
            )));
        }
        for (field, other) in fields.iter_mut().zip(schema.fields().iter()) {
            if field.data_type() != other.data_type() {
                return Err(LoaderError::schema_mismatch(format!(
                    "column {:?} is {} in {first_label} but {} in {label}",
                    field.name(),
                    field.data_type(),
                    other.data_type()
                )));
            }
            if other.is_nullable() && !field.is_nullable() {
                *field = field.clone().with_nullable(true);
            }
        }
    }
    Ok(Some(Arc::new(Schema::new(fields))))
}

/// Concatenate batches that passed [`unify_schemas`] under `schema`.
pub fn concat_unified(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch> {
    let rebased = batches
        .iter()
        .map(|b| {
            let options = RecordBatchOptions::new().with_row_count(Some(b.num_rows()));
            RecordBatch::try_new_with_options(schema.clone(), b.columns().to_vec(), &options)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(schema, &rebased)?)
}
