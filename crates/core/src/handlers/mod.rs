//! Per-tag behaviour of the tag stage.
//!
//! Each element name maps to one [`TagHandler`] in a [`HandlerRegistry`].
//! The registry is built once and shared read-only between runs; handlers
//! never hold per-run state themselves. Anything a handler produces besides
//! the node it returns (diagnostics, bookmark numbers, the document title) goes
//! through the [`HandlerCtx`] and is folded back into the run's context by the
//! stage.

mod block;
mod inline;
mod list;
mod table;

pub use block::{
    DivisionHandler, HeadingHandler, IgnoreHandler, ParagraphHandler, PreformattedHandler,
    TitleHandler, TransparentHandler,
};
pub use inline::{HorizontalRuleHandler, ImageHandler, LineBreakHandler, LinkHandler};
pub use list::{ListHandler, ListItemHandler};
pub use table::{CellHandler, RowHandler, TableHandler};

use crate::config::ConversionConfig;
use crate::context::Counters;
use sheaf_idf::{BlockStyle, ContentNode, NodeMetadata, TextRun};
use sheaf_markup::Attributes;
use sheaf_style::StyleMap;
use sheaf_traits::ResourceProvider;
use sheaf_types::Diagnostic;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Index of a handler within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub usize);

impl HandlerId {
    pub const FALLBACK: HandlerId = HandlerId(usize::MAX);
}

/// What happened to a text run offered to a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum TextFlow {
    /// Not handled; flows on to the nearest node.
    Pass(TextRun),
    /// Handled or swallowed.
    Consumed,
}

pub trait TagHandler: Send + Sync + Debug {
    /// Creates the element's node, or `None` for a transparent element.
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode>;

    /// Offered every text run whose innermost element is this one or one of
    /// its transparent descendants. `node` is this element's own node.
    fn append_text(
        &self,
        _node: Option<&mut ContentNode>,
        run: TextRun,
        _cx: &mut HandlerCtx<'_>,
    ) -> TextFlow {
        TextFlow::Pass(run)
    }

    /// Finalizes the node. Returning `None` discards it.
    fn close(&self, node: ContentNode, _cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(node)
    }
}

/// The view of the run a handler gets for one call.
pub struct HandlerCtx<'a> {
    pub tag: &'a str,
    pub attributes: &'a Attributes,
    pub style: &'a StyleMap,
    pub config: &'a ConversionConfig,
    pub resources: &'a dyn ResourceProvider,
    counters: Counters,
    diagnostics: Vec<Diagnostic>,
    title: String,
}

/// Side effects of a handler call, applied to the context afterwards.
#[derive(Debug, Default)]
pub struct HandlerEffects {
    pub counters: Counters,
    pub diagnostics: Vec<Diagnostic>,
    pub title: String,
}

impl<'a> HandlerCtx<'a> {
    pub fn new(
        tag: &'a str,
        attributes: &'a Attributes,
        style: &'a StyleMap,
        config: &'a ConversionConfig,
        resources: &'a dyn ResourceProvider,
        counters: Counters,
    ) -> Self {
        Self {
            tag,
            attributes,
            style,
            config,
            resources,
            counters,
            diagnostics: Vec::new(),
            title: String::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Allocates the next bookmark number, starting at 1.
    pub fn next_bookmark(&mut self) -> usize {
        self.counters.bookmarks += 1;
        self.counters.bookmarks
    }

    pub fn append_title(&mut self, text: &str) {
        self.title.push_str(text);
    }

    /// Node metadata carrying the element's id and block-level style.
    pub fn metadata(&self) -> NodeMetadata {
        let line_height = if self.style.get("line-height").is_some() {
            self.style.line_height()
        } else {
            0.0
        };
        NodeMetadata {
            id: self.attribute("id").filter(|id| !id.is_empty()).map(str::to_string),
            tag: self.tag.to_string(),
            style: BlockStyle {
                margins: self.style.margins(),
                padding: self.style.padding(),
                text_align: self.style.text_align(),
                background: self.style.background_color(),
                line_height,
            },
            bookmark: None,
            anonymous: false,
        }
    }

    pub fn finish(self) -> HandlerEffects {
        HandlerEffects {
            counters: self.counters,
            diagnostics: self.diagnostics,
            title: self.title,
        }
    }
}

/// Maps tag names to handlers, with a fallback for everything else.
#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn TagHandler>>,
    by_tag: HashMap<String, HandlerId>,
    fallback: Arc<dyn TagHandler>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerRegistry {
    /// An empty registry; every tag goes to `fallback`.
    pub fn new(fallback: Arc<dyn TagHandler>) -> Self {
        Self {
            handlers: Vec::new(),
            by_tag: HashMap::new(),
            fallback,
        }
    }

    /// The standard HTML element set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(Arc::new(TransparentHandler));
        registry.register(
            &[
                "html", "body", "span", "font", "b", "strong", "i", "em", "u", "s", "strike",
                "del", "ins", "sub", "sup", "small", "big", "code", "tt", "kbd", "samp", "label",
                "abbr", "acronym", "cite", "var", "dfn", "q", "center", "section", "article",
                "header", "footer", "nav", "main", "aside", "figure", "form", "thead", "tbody",
                "tfoot", "colgroup", "col", "noscript",
            ],
            Arc::new(TransparentHandler),
        );
        registry.register(
            &["p", "address", "figcaption", "dt", "dd", "caption"],
            Arc::new(ParagraphHandler),
        );
        registry.register(&["pre", "listing"], Arc::new(PreformattedHandler));
        registry.register(&["div", "blockquote", "dl"], Arc::new(DivisionHandler));
        registry.register(&["h1", "h2", "h3", "h4", "h5", "h6"], Arc::new(HeadingHandler));
        registry.register(&["ul", "ol"], Arc::new(ListHandler));
        registry.register(&["li"], Arc::new(ListItemHandler));
        registry.register(&["table"], Arc::new(TableHandler));
        registry.register(&["tr"], Arc::new(RowHandler));
        registry.register(&["td", "th"], Arc::new(CellHandler));
        registry.register(&["img"], Arc::new(ImageHandler));
        registry.register(&["br"], Arc::new(LineBreakHandler));
        registry.register(&["hr"], Arc::new(HorizontalRuleHandler));
        registry.register(&["a"], Arc::new(LinkHandler));
        registry.register(&["title"], Arc::new(TitleHandler));
        registry.register(
            &["head", "script", "style", "meta", "link", "base", "textarea", "select"],
            Arc::new(IgnoreHandler),
        );
        registry
    }

    /// Registers `handler` for each tag, replacing earlier registrations.
    pub fn register(&mut self, tags: &[&str], handler: Arc<dyn TagHandler>) -> HandlerId {
        let id = HandlerId(self.handlers.len());
        self.handlers.push(handler);
        for tag in tags {
            self.by_tag.insert(tag.to_ascii_lowercase(), id);
        }
        id
    }

    pub fn lookup(&self, tag: &str) -> Option<HandlerId> {
        self.by_tag.get(tag).copied()
    }

    /// The handler for `tag`, or the fallback.
    pub fn resolve(&self, tag: &str) -> HandlerId {
        self.lookup(tag).unwrap_or(HandlerId::FALLBACK)
    }

    pub fn get(&self, id: HandlerId) -> &Arc<dyn TagHandler> {
        self.handlers.get(id.0).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sheaf_traits::InMemoryResourceProvider;

    /// Owns everything a `HandlerCtx` borrows.
    pub struct Harness {
        pub attributes: Attributes,
        pub style: StyleMap,
        pub config: ConversionConfig,
        pub resources: InMemoryResourceProvider,
        pub counters: Counters,
    }

    impl Harness {
        pub fn new(attributes: &[(&str, &str)]) -> Self {
            Self {
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                style: StyleMap::new(),
                config: ConversionConfig::default(),
                resources: InMemoryResourceProvider::new(),
                counters: Counters::default(),
            }
        }

        pub fn cx<'a>(&'a self, tag: &'a str) -> HandlerCtx<'a> {
            HandlerCtx::new(
                tag,
                &self.attributes,
                &self.style,
                &self.config,
                &self.resources,
                self.counters,
            )
        }
    }
}
