use arrow::datatypes::SchemaRef;

use super::expr::Expr;
use super::harmonize::SchemaHarmonizer;
use super::logical::{PartitionPlan, Step};
use crate::data::model::Partition;
use crate::error::Result;
use crate::resolve::Resolution;

/// Builds the per-partition pipeline:
///
/// 1. scan only the resolved raw columns
/// 2. harmonize timestamp precision
/// 3. cleaning filter
/// 4. derivations, in request order
/// 5. sample filter
/// 6. projection to the requested outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanBuilder {
    harmonizer: SchemaHarmonizer,
}

impl QueryPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &self,
        partition: &Partition,
        schema: SchemaRef,
        resolution: &Resolution,
        sample: Option<&Expr>,
    ) -> Result<PartitionPlan> {
        let plan = PartitionPlan::scan(partition.clone(), schema, resolution.raw_columns.clone())?;
        let mut plan = self.harmonizer.harmonize(plan, &resolution.raw_columns)?;

        if let Some(cleaning) = &resolution.cleaning {
            plan = plan.with_step(Step::Filter(cleaning.clone()));
        }
        if !resolution.derivations.is_empty() {
            plan = plan.with_step(Step::WithColumns(resolution.derivations.clone()));
        }
        if let Some(sample) = sample {
            plan = plan.with_step(Step::Filter(sample.clone()));
        }
        Ok(plan.with_step(Step::Select(resolution.output_columns.clone())))
    }
}
