//! Task: Bootstrap planning.
//!
//! Any role whose writable tree cannot be seeded halts the run here, before a
//! single workload is composed.

use super::{SynthContext, log_task_error, task_start};
use crate::bootstrap::plan;
use crate::pipeline::PipelineTask;
use gantry_shared::GantryResult;

pub struct PlanTask;

impl PipelineTask<SynthContext> for PlanTask {
    fn run(&self, ctx: &mut SynthContext) -> GantryResult<()> {
        let task_name = self.name();
        task_start(ctx, task_name);

        let plans = ctx
            .specs
            .iter()
            .map(plan)
            .collect::<GantryResult<Vec<_>>>()
            .inspect_err(|e| log_task_error(ctx, task_name, e))?;

        for (spec, plan) in ctx.specs.iter().zip(&plans) {
            if let Some(plan) = plan {
                tracing::debug!(
                    role = %spec.kind(),
                    target = %plan.target,
                    steps = plan.steps.len(),
                    "Role needs a bootstrap stage"
                );
            }
        }

        ctx.plans = Some(plans);
        Ok(())
    }

    fn name(&self) -> &str {
        "bootstrap_plan"
    }
}
