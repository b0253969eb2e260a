//! Table-driven pipeline execution.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline → Stages → Tasks
//!
//! - Pipeline: Runs every stage in order, stops at the first error
//! - Stage: Named group of tasks run one after another
//! - Task: Atomic unit of work over a mutable context
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pipeline::{ExecutionPlan, PipelineBuilder, PipelineExecutor, Stage};
//!
//! let plan = ExecutionPlan::new(vec![
//!     Stage::new("first", vec![Box::new(TaskA)]),
//!     Stage::new("second", vec![Box::new(TaskB)]),
//! ]);
//!
//! let mut ctx = Context::default();
//! let pipeline = PipelineBuilder::from_plan(plan);
//! let metrics = PipelineExecutor::execute(pipeline, &mut ctx)?;
//! println!("pipeline took {}us", metrics.total_duration_us);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
pub use pipeline::{ExecutionPlan, Pipeline, PipelineBuilder, PipelineExecutor};
pub use stage::Stage;
pub use task::{BoxedTask, PipelineTask};
