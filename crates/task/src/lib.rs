//! Story generation orchestration for taleweave
//!
//! A [`StorySpec`](taleweave_core::StorySpec) goes through four stages:
//!
//! 1. The [`RequestPlanner`] expands it into a [`TaskGraph`] with a content
//!    fingerprint per task.
//! 2. The [`Scheduler`] runs ready tasks against the [`Provider`]s under
//!    global and per-kind concurrency caps, consulting the content cache
//!    before every call.
//! 3. Failed attempts go through the retry controller; terminal failures
//!    fail their dependents without dispatching them.
//! 4. The [`ResultAssembler`] folds completion events into a page-ordered
//!    [`StoryAssembly`](taleweave_core::StoryAssembly).
//!
//! [`JobManager`] ties these together behind submit, poll and cancel.

pub mod assembler;
pub mod graph;
pub mod orchestrator;
pub mod planner;
pub mod provider;
pub mod scheduler;

pub use assembler::ResultAssembler;
pub use graph::{TaskGraph, TaskGraphBuilder};
pub use orchestrator::{JobManager, OrchestrationContext, OrchestrationContextBuilder};
pub use planner::{RequestPlanner, DEFAULT_MAX_PAGES};
pub use provider::{
    HttpProvider, Provider, ProviderRegistry, ProviderRequest, SimulatedProvider, UpstreamArtifact,
};
pub use scheduler::{
    ConcurrencyLimits, DispatchPermit, Gauge, RunEnd, RunSummary, Scheduler, SchedulerRun,
};
