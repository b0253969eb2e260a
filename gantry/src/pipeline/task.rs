//! Generic task trait for pipeline execution.

use gantry_shared::GantryResult;

/// Trait for tasks that can be executed in a pipeline.
///
/// Tasks read their inputs from the context and store their output back
/// into it for later stages.
pub trait PipelineTask<Ctx> {
    fn run(&self, ctx: &mut Ctx) -> GantryResult<()>;

    /// Get human-readable task name for logging.
    fn name(&self) -> &str;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;
