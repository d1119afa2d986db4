//! Configuration for the taleweave orchestrator
//!
//! Defaults are overridden by an optional JSON file, which is in turn
//! overridden by `TALEWEAVE_*` environment variables.

pub mod config;
pub mod loader;

pub use config::*;
pub use loader::*;
