//! Core domain types, errors, and events for the `taleweave` orchestrator.
//!
//! This crate establishes the foundational data structures shared by the
//! planner, cache, scheduler and assembler. Nothing here performs I/O.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing every job-level failure mode.
//! - **`types`**: Tasks, fingerprints, artifacts, story specifications, the
//!   provider failure taxonomy and the page-ordered `StoryAssembly`.
//! - **`events`**: The `TaskCompletion` events a scheduler run emits.

pub mod errors;
pub mod events;
pub mod types;

pub use self::{
    errors::{Error, Result},
    events::{CompletionOutcome, TaskCompletion},
    types::*,
};
