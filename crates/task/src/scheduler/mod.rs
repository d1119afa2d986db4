//! Bounded scheduler
//!
//! Drives a task graph to completion against the providers, honouring the
//! global and per-kind concurrency caps. Ready tasks are admitted lowest page
//! first; the outline and cover count as page 0. The scheduler never retries
//! on its own; every failed attempt goes to the retry controller, and a retry
//! releases the slot until its backoff has elapsed.

mod driver;
mod limits;
mod worker;

pub use limits::{ConcurrencyLimits, DispatchPermit, Gauge};

use crate::orchestrator::OrchestrationContext;
use crate::graph::TaskGraph;
use driver::RunDriver;
use serde::Serialize;
use std::sync::Arc;
use taleweave_core::{ProviderCall, Task, TaskCompletion};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunEnd {
    /// Every task reached a terminal state on its own
    Drained,
    Cancelled,
    BudgetExhausted,
    /// Work remained but nothing could make progress
    Stalled,
}

/// Totals for one finished run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub end: RunEnd,
    pub total: usize,
    pub done: usize,
    pub from_cache: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retries: usize,
    /// Every provider attempt made during the run, in completion order
    pub calls: Vec<ProviderCall>,
    /// Final task records in dependency order, with status, attempts and result
    pub tasks: Vec<Task>,
}

/// A running scheduler: its completion events and its final summary
pub struct SchedulerRun {
    pub events: UnboundedReceiverStream<TaskCompletion>,
    pub handle: JoinHandle<RunSummary>,
}

/// Runs task graphs against a shared orchestration context
#[derive(Debug, Clone)]
pub struct Scheduler {
    ctx: Arc<OrchestrationContext>,
}

impl Scheduler {
    pub fn new(ctx: Arc<OrchestrationContext>) -> Self {
        Self { ctx }
    }

    /// Start driving `graph` on the current Tokio runtime
    ///
    /// Completion events arrive as tasks reach a terminal state. The stream
    /// ends once every task is terminal; cancelling `cancel` ends the run
    /// early with the unfinished tasks marked cancelled. The run is
    /// instrumented with the caller's current span.
    pub fn run(&self, graph: Arc<TaskGraph>, cancel: CancellationToken) -> SchedulerRun {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = RunDriver::new(Arc::clone(&self.ctx), graph, tx, cancel);
        let handle = tokio::spawn(driver.run().instrument(tracing::Span::current()));
        SchedulerRun {
            events: UnboundedReceiverStream::new(rx),
            handle,
        }
    }
}
