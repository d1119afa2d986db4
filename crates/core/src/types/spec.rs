//! Story specification submitted by callers

use serde::{Deserialize, Serialize};

const DEFAULT_ART_STYLE: &str = "watercolor";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_TEXT_MODEL: &str = "text-default";
const DEFAULT_IMAGE_MODEL: &str = "image-default";

/// A character appearing in the story
///
/// Photos and avatars are produced outside the orchestrator; only their
/// hashes and references reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRef {
    pub name: String,
    #[serde(default)]
    pub photo_hashes: Vec<String>,
    /// Reference to a pre-generated avatar artifact
    #[serde(default)]
    pub avatar: Option<String>,
}

impl CharacterRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            photo_hashes: Vec::new(),
            avatar: None,
        }
    }

    pub fn with_photo(mut self, hash: impl Into<String>) -> Self {
        self.photo_hashes.push(hash.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Everything the planner needs to expand a story into tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySpec {
    pub title: String,
    /// Signed so that malformed requests reach validation instead of failing to parse
    pub pages: i64,
    #[serde(default)]
    pub characters: Vec<CharacterRef>,
    #[serde(default = "default_art_style")]
    pub art_style: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub premise: Option<String>,
    /// Optional per-page direction, index 0 is page 1
    #[serde(default)]
    pub page_briefs: Vec<String>,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

impl StorySpec {
    pub fn new(title: impl Into<String>, pages: i64) -> Self {
        Self {
            title: title.into(),
            pages,
            characters: Vec::new(),
            art_style: default_art_style(),
            language: default_language(),
            premise: None,
            page_briefs: Vec::new(),
            text_model: default_text_model(),
            image_model: default_image_model(),
        }
    }

    pub fn with_character(mut self, character: CharacterRef) -> Self {
        self.characters.push(character);
        self
    }

    pub fn with_art_style(mut self, style: impl Into<String>) -> Self {
        self.art_style = style.into();
        self
    }

    pub fn with_premise(mut self, premise: impl Into<String>) -> Self {
        self.premise = Some(premise.into());
        self
    }

    pub fn with_page_brief(mut self, brief: impl Into<String>) -> Self {
        self.page_briefs.push(brief.into());
        self
    }
}

fn default_art_style() -> String {
    DEFAULT_ART_STYLE.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_text_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}
