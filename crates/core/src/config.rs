//! Run configuration, loadable from JSON with camelCase keys.

use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use sheaf_markup::{MarkupConfig, NewLineMode, UnknownEntityMode};
use sheaf_style::{Margins, PageSize};
use sheaf_traits::PageLayout;
use std::path::Path;

/// Whether text runs carry font program bytes for embedding or only name a
/// face the reader is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontEmbedding {
    Embed,
    #[default]
    ReferenceOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    pub size: PageSize,
    pub margins: Margins,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margins: Margins::all(56.69),
        }
    }
}

impl PageConfig {
    pub fn layout(&self) -> PageLayout {
        PageLayout {
            size: self.size.clone(),
            margins: self.margins.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionConfig {
    /// Unknown tags are skipped but their content kept; when false the whole
    /// subtree is dropped.
    pub accept_unknown_tags: bool,
    /// Headings get an outline entry.
    pub auto_bookmark: bool,
    pub new_line_policy: NewLineMode,
    pub font_embedding: FontEmbedding,
    pub charset_override: Option<String>,
    pub unknown_entity: UnknownEntityMode,
    /// Media type `@media` rules are evaluated against.
    pub media: String,
    pub default_font_family: String,
    pub page: PageConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            accept_unknown_tags: true,
            auto_bookmark: true,
            new_line_policy: NewLineMode::TagSet,
            font_embedding: FontEmbedding::ReferenceOnly,
            charset_override: None,
            unknown_entity: UnknownEntityMode::Literal,
            media: "print".to_string(),
            default_font_family: "Helvetica".to_string(),
            page: PageConfig::default(),
        }
    }
}

impl ConversionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, ConversionError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConversionError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loading conversion config from {}", path.as_ref().display());
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.media.trim().is_empty() {
            return Err(ConversionError::Config("media must not be empty".to_string()));
        }
        if self.default_font_family.trim().is_empty() {
            return Err(ConversionError::Config(
                "defaultFontFamily must not be empty".to_string(),
            ));
        }
        let (width, height) = self.page.size.dimensions_pt();
        let margins = &self.page.margins;
        if width <= margins.horizontal() || height <= margins.vertical() {
            return Err(ConversionError::Config(format!(
                "page margins leave no room for content on a {}x{}pt page",
                width, height
            )));
        }
        Ok(())
    }

    pub fn with_accept_unknown_tags(mut self, accept: bool) -> Self {
        self.accept_unknown_tags = accept;
        self
    }

    pub fn with_auto_bookmark(mut self, enabled: bool) -> Self {
        self.auto_bookmark = enabled;
        self
    }

    pub fn with_new_line_policy(mut self, mode: NewLineMode) -> Self {
        self.new_line_policy = mode;
        self
    }

    pub fn with_font_embedding(mut self, embedding: FontEmbedding) -> Self {
        self.font_embedding = embedding;
        self
    }

    pub fn with_charset_override(mut self, label: impl Into<String>) -> Self {
        self.charset_override = Some(label.into());
        self
    }

    pub fn with_unknown_entity(mut self, mode: UnknownEntityMode) -> Self {
        self.unknown_entity = mode;
        self
    }

    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media = media.into();
        self
    }

    pub fn with_default_font_family(mut self, family: impl Into<String>) -> Self {
        self.default_font_family = family.into();
        self
    }

    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.page.size = size;
        self
    }

    pub fn with_page_margins(mut self, margins: Margins) -> Self {
        self.page.margins = margins;
        self
    }

    /// The part of the configuration the markup parser reads.
    pub fn markup_config(&self) -> MarkupConfig {
        MarkupConfig {
            new_line: self.new_line_policy,
            unknown_entity: self.unknown_entity,
            charset_override: self.charset_override.clone(),
        }
    }
}
