//! Reading story requests from disk

use std::path::Path;
use taleweave_core::{Error, Result, StorySpec};

/// Read a JSON story request; `-` reads standard input
pub fn load(path: &Path) -> Result<StorySpec> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| Error::file_system(path, "read story request", e))?
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read story request", e))?
    };
    serde_json::from_str(&content).map_err(|e| {
        Error::invalid_spec(format!("{} is not a valid story request: {e}", path.display()))
    })
}
