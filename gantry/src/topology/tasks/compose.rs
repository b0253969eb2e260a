//! Task: Role composition.

use super::{SynthContext, log_task_error, task_start};
use crate::compose::compose;
use crate::pipeline::PipelineTask;
use crate::topology::types::required;
use gantry_shared::GantryResult;

pub struct ComposeTask;

impl PipelineTask<SynthContext> for ComposeTask {
    fn run(&self, ctx: &mut SynthContext) -> GantryResult<()> {
        let task_name = self.name();
        task_start(ctx, task_name);

        let payloads = required(&ctx.payloads, "config_render")?;
        let plans = required(&ctx.plans, "bootstrap_plan")?;

        let roles = ctx
            .specs
            .iter()
            .zip(payloads)
            .zip(plans)
            .map(|((spec, payload), plan)| compose(spec, payload, plan.as_ref()))
            .collect::<GantryResult<Vec<_>>>()
            .inspect_err(|e| log_task_error(ctx, task_name, e))?;

        ctx.roles = Some(roles);
        Ok(())
    }

    fn name(&self) -> &str {
        "role_compose"
    }
}
