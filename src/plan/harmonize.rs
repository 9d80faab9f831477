//! Timestamp precision normalization ahead of cross-partition union.
//!
//! Monthly files are written independently and may store `pickup_datetime`
//! as nanoseconds in one month and microseconds in the next. Unioning those
//! fails, so every requested timestamp column is cast to one canonical unit
//! before the partition plans are combined.

use arrow::datatypes::{DataType, TimeUnit};
use log::debug;

use super::expr::{col, Expr};
use super::logical::{PartitionPlan, Step};
use crate::error::Result;

/// Unit every timestamp column is brought to.
pub const CANONICAL_UNIT: TimeUnit = TimeUnit::Microsecond;

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaHarmonizer;

impl SchemaHarmonizer {
    /// Append casts for the `required` timestamp columns of `plan` whose unit
    /// is not [`CANONICAL_UNIT`]. Timezones are kept. Columns that are not
    /// in the plan's current output are ignored.
    ///
    /// Applying it to its own result returns that result unchanged.
    pub fn harmonize(&self, plan: PartitionPlan, required: &[String]) -> Result<PartitionPlan> {
        let schema = plan.output_schema()?;
        let casts: Vec<Expr> = required
            .iter()
            .filter_map(|name| {
                let field = schema.field_with_name(name).ok()?;
                match field.data_type() {
                    DataType::Timestamp(unit, tz) if *unit != CANONICAL_UNIT => Some(
                        col(name.as_str()).cast(DataType::Timestamp(CANONICAL_UNIT, tz.clone())),
                    ),
                    _ => None,
                }
            })
            .collect();

        if casts.is_empty() {
            return Ok(plan);
        }
        debug!(
            "{}: casting {} timestamp column(s) to {CANONICAL_UNIT:?}",
            plan.partition.file_name(),
            casts.len()
        );
        Ok(plan.with_step(Step::WithColumns(casts)))
    }
}
