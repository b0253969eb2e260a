//! Generic pipeline execution framework.

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
use super::stage::Stage;
use super::task::BoxedTask;
use gantry_shared::GantryResult;
use std::time::Instant;

pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }

    pub fn stages(self) -> Vec<Stage<BoxedTask<Ctx>>> {
        self.stages
    }
}

pub struct Pipeline<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }
}

pub struct PipelineBuilder;

impl PipelineBuilder {
    pub fn from_plan<Ctx>(plan: ExecutionPlan<Ctx>) -> Pipeline<Ctx> {
        Pipeline::new(plan.stages())
    }
}

/// Pipeline executor framework.
///
/// This provides the generic infrastructure for executing a table-driven pipeline.
/// The actual task execution logic is provided by task implementations.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a pipeline.
    ///
    /// Iterates through stages in order and runs their tasks one by one.
    /// The first failing task aborts the run and its error is returned as is.
    pub fn execute<Ctx>(pipeline: Pipeline<Ctx>, ctx: &mut Ctx) -> GantryResult<PipelineMetrics> {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::new();

        for (index, stage) in pipeline.stages.into_iter().enumerate() {
            let stage_start = Instant::now();
            let mut task_metrics = Vec::new();

            for task in &stage.tasks {
                let task_start = Instant::now();
                task.run(ctx)?;
                task_metrics.push(TaskMetrics {
                    name: task.name().to_string(),
                    duration_us: task_start.elapsed().as_micros(),
                });
            }

            stage_metrics.push(StageMetrics {
                index,
                name: stage.name.to_string(),
                duration_us: stage_start.elapsed().as_micros(),
                tasks: task_metrics,
            });
        }

        Ok(PipelineMetrics {
            total_duration_us: total_start.elapsed().as_micros(),
            stages: stage_metrics,
        })
    }
}
