//! Decides which tags start a new line, which in turn controls how whitespace
//! next to their boundaries is treated.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub trait NewLinePolicy: Send + Sync + Debug {
    fn is_new_line_tag(&self, tag: &str) -> bool;
}

/// Block-level elements start a new line.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTagPolicy;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "html", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "ul",
];

impl NewLinePolicy for BlockTagPolicy {
    fn is_new_line_tag(&self, tag: &str) -> bool {
        BLOCK_TAGS.binary_search(&tag).is_ok()
    }
}

/// No tag starts a new line; boundary whitespace is always kept as a space.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPolicy;

impl NewLinePolicy for NeverPolicy {
    fn is_new_line_tag(&self, _tag: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewLineMode {
    #[default]
    TagSet,
    Never,
}

impl NewLineMode {
    pub fn policy(&self) -> Box<dyn NewLinePolicy> {
        match self {
            NewLineMode::TagSet => Box::new(BlockTagPolicy),
            NewLineMode::Never => Box::new(NeverPolicy),
        }
    }
}
