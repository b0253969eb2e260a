//! Task: Config rendering.

use super::{SynthContext, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::render::render;
use gantry_shared::GantryResult;

pub struct RenderTask;

impl PipelineTask<SynthContext> for RenderTask {
    fn run(&self, ctx: &mut SynthContext) -> GantryResult<()> {
        let task_name = self.name();
        task_start(ctx, task_name);

        let payloads = ctx
            .specs
            .iter()
            .map(|spec| render(&spec.name, &spec.params))
            .collect::<GantryResult<Vec<_>>>()
            .inspect_err(|e| log_task_error(ctx, task_name, e))?;

        ctx.payloads = Some(payloads);
        Ok(())
    }

    fn name(&self) -> &str {
        "config_render"
    }
}
