//! Orchestration: the injectable context and the job manager on top of it

mod context;
mod jobs;

pub use context::{OrchestrationContext, OrchestrationContextBuilder};
pub use jobs::JobManager;
