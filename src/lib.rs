pub mod config;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod transform;

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunSummary};
pub use progress::ProgressLog;
pub use transform::TransformOutcome;
