//! Error types and result extensions for taleweave operations

mod builders;
mod conversions;
mod types;

pub use types::{Error, Result};
