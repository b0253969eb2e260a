//! Synthesis pipeline tasks.

mod compose;
mod plan;
mod render;
mod validate;

pub use compose::ComposeTask;
pub use plan::PlanTask;
pub use render::RenderTask;
pub use validate::ValidateTask;

use super::types::SynthContext;
use gantry_shared::GantryError;

pub(super) fn task_start(ctx: &SynthContext, task_name: &str) {
    tracing::debug!(
        namespace = %ctx.namespace,
        task = task_name,
        roles = ctx.specs.len(),
        "Starting synthesis task"
    );
}

pub(super) fn log_task_error(ctx: &SynthContext, task_name: &str, error: &GantryError) {
    tracing::error!(
        namespace = %ctx.namespace,
        task = task_name,
        error = %error,
        "Synthesis task failed"
    );
}
