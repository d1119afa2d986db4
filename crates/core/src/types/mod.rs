//! Domain types for story generation jobs
//!
//! Tasks, fingerprints and artifacts describe the work; `StorySpec` is what a
//! caller submits; `StoryAssembly` is what it gets back.

pub mod artifact;
pub mod assembly;
pub mod failure;
pub mod ids;
pub mod spec;
pub mod task;

pub use artifact::Artifact;
pub use assembly::{JobState, PageContent, StoryAssembly, TaskFailure};
pub use failure::{ErrorClass, FailureReason, ProviderError};
pub use ids::{Fingerprint, JobId, TaskId};
pub use spec::{CharacterRef, StorySpec};
pub use task::{CallOutcome, ProviderCall, ProviderKind, Task, TaskKind, TaskStatus};
