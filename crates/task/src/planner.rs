//! Request planner: expands a story request into a task graph
//!
//! Shape of the plan for N pages:
//!
//! ```text
//! outline ─┬─ page-1-text ── page-1-image
//!          ├─ ...
//!          ├─ page-N-text ── page-N-image
//!          └─ cover
//! ```
//!
//! Each task's input holds only what its provider needs. Fingerprints are
//! computed here, upstream first, so a downstream fingerprint includes the
//! fingerprints of everything upstream of it.

use crate::graph::TaskGraph;
use serde_json::{json, Value};
use taleweave_cache::task_fingerprint;
use taleweave_core::{CharacterRef, Error, Fingerprint, Result, StorySpec, Task, TaskId, TaskKind};

/// Largest page count accepted when no configuration says otherwise
pub const DEFAULT_MAX_PAGES: u32 = 64;

#[derive(Debug, Clone)]
pub struct RequestPlanner {
    max_pages: u32,
}

impl RequestPlanner {
    pub fn new(max_pages: u32) -> Self {
        Self { max_pages }
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Validate `spec` and build its task graph
    pub fn plan(&self, spec: &StorySpec) -> Result<TaskGraph> {
        let pages = self.validate(spec)?;
        let characters = canonical_characters(&spec.characters);

        let mut builder = TaskGraph::builder();

        let outline_input = json!({
            "title": spec.title.trim(),
            "pages": pages,
            "language": spec.language,
            "premise": spec.premise,
            "characters": characters.iter().map(|c| c["name"].clone()).collect::<Vec<_>>(),
            "pageBriefs": spec.page_briefs,
            "model": spec.text_model,
        });
        let outline_fp = task_fingerprint(TaskKind::Outline, &outline_input, &[]);
        builder.add_task(Task::new(
            TaskId::outline(),
            TaskKind::Outline,
            None,
            outline_fp.clone(),
            outline_input,
        ))?;

        for page in 1..=pages {
            let brief = spec.page_briefs.get(page as usize - 1);
            let text_input = json!({
                "page": page,
                "pages": pages,
                "brief": brief,
                "language": spec.language,
                "model": spec.text_model,
            });
            let text_fp = task_fingerprint(
                TaskKind::PageText,
                &text_input,
                std::slice::from_ref(&outline_fp),
            );

            let image_input = json!({
                "page": page,
                "artStyle": spec.art_style,
                "characters": characters,
                "model": spec.image_model,
            });
            let image_fp = task_fingerprint(
                TaskKind::PageImage,
                &image_input,
                std::slice::from_ref(&text_fp),
            );

            builder.add_task(
                Task::new(
                    TaskId::page_text(page),
                    TaskKind::PageText,
                    Some(page),
                    text_fp,
                    text_input,
                )
                .depends_on(TaskId::outline()),
            )?;
            builder.add_task(
                Task::new(
                    TaskId::page_image(page),
                    TaskKind::PageImage,
                    Some(page),
                    image_fp,
                    image_input,
                )
                .depends_on(TaskId::page_text(page)),
            )?;
        }

        let cover_input = json!({
            "title": spec.title.trim(),
            "artStyle": spec.art_style,
            "characters": characters,
            "model": spec.image_model,
        });
        let cover_fp: Fingerprint = task_fingerprint(
            TaskKind::CoverImage,
            &cover_input,
            std::slice::from_ref(&outline_fp),
        );
        builder.add_task(
            Task::new(
                TaskId::cover(),
                TaskKind::CoverImage,
                None,
                cover_fp,
                cover_input,
            )
            .depends_on(TaskId::outline()),
        )?;

        let graph = builder.build()?;
        tracing::debug!(
            title = %spec.title,
            pages,
            tasks = graph.len(),
            "story planned"
        );
        Ok(graph)
    }

    fn validate(&self, spec: &StorySpec) -> Result<u32> {
        if spec.pages <= 0 {
            return Err(Error::invalid_spec(format!(
                "pages must be positive, got {}",
                spec.pages
            )));
        }
        if spec.pages > i64::from(self.max_pages) {
            return Err(Error::invalid_spec(format!(
                "a story can have at most {} pages, got {}",
                self.max_pages, spec.pages
            )));
        }
        // Bounded by max_pages above
        let pages = spec.pages as u32;

        if spec.title.trim().is_empty() {
            return Err(Error::invalid_spec("title must not be empty"));
        }
        if spec.page_briefs.len() > pages as usize {
            return Err(Error::invalid_spec(format!(
                "{} page briefs given for a {pages}-page story",
                spec.page_briefs.len()
            )));
        }
        if let Some(idx) = spec.characters.iter().position(|c| c.name.trim().is_empty()) {
            return Err(Error::invalid_spec(format!(
                "character {} has an empty name",
                idx + 1
            )));
        }
        Ok(pages)
    }
}

impl Default for RequestPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES)
    }
}

/// Characters as image inputs: sorted by name, photo hashes sorted and deduplicated
fn canonical_characters(characters: &[CharacterRef]) -> Vec<Value> {
    let mut out: Vec<Value> = characters
        .iter()
        .map(|c| {
            let mut photos: Vec<&str> = c.photo_hashes.iter().map(String::as_str).collect();
            photos.sort_unstable();
            photos.dedup();
            json!({
                "name": c.name.trim(),
                "photoHashes": photos,
                "avatar": c.avatar,
            })
        })
        .collect();
    out.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    out
}
