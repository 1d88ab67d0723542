//! Cascades styles onto elements as they open.
//!
//! The stage keeps the open-element chain the selectors match against and
//! pushes one `StyleMap` per element onto the context's style stack. Stylesheets
//! found in the document (`<style>` bodies and `<link rel="stylesheet">`) are
//! registered as they close, so they apply to the elements that follow.

use crate::context::Context;
use crate::error::ConversionError;
use crate::pipeline::{EventQueue, Flow, Stage};
use sheaf_css::media::media_matches;
use sheaf_css::{CssResolver, Element, Stylesheet, StylesheetParser};
use sheaf_markup::{Attributes, Event};
use sheaf_traits::{PageLayout, ResourceProvider};
use sheaf_types::Diagnostic;
use std::sync::Arc;

/// Text of the `<style>` element currently open, kept in the stage's slot of
/// the context.
#[derive(Debug, Default)]
struct StyleBody {
    open: bool,
    applies: bool,
    text: String,
}

pub struct CssStage {
    resolver: CssResolver,
    resources: Arc<dyn ResourceProvider>,
    /// Open elements, root first.
    elements: Vec<Element>,
    /// Children seen so far under each open element, plus one slot for the
    /// document itself at the bottom.
    child_counts: Vec<usize>,
}

impl CssStage {
    /// `resolver` carries the built-in and caller-supplied stylesheets.
    pub fn new(resolver: CssResolver, resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            resolver,
            resources,
            elements: Vec::new(),
            child_counts: vec![0],
        }
    }

    fn open(&mut self, tag: &str, attributes: &Attributes, ctx: &mut Context) {
        let first_child = match self.child_counts.last_mut() {
            Some(count) => {
                *count += 1;
                *count == 1
            }
            None => true,
        };
        let element = Element::new(tag, attributes.clone()).with_first_child(first_child);

        let mut diagnostics = Vec::new();
        let style = self
            .resolver
            .resolve(&element, &self.elements, ctx.current_style(), &mut diagnostics);
        ctx.extend_diagnostics(diagnostics);
        ctx.push_style(Arc::new(style));
        self.elements.push(element);
        self.child_counts.push(0);

        match tag {
            "style" => {
                let applies = attributes
                    .get("media")
                    .is_none_or(|media| media_matches(media, &ctx.config().media));
                *ctx.stage_state::<StyleBody>() = StyleBody {
                    open: true,
                    applies,
                    text: String::new(),
                };
            }
            "link" => self.link(attributes, ctx),
            _ => {}
        }
    }

    fn link(&mut self, attributes: &Attributes, ctx: &mut Context) {
        let is_stylesheet = attributes
            .get("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
        if !is_stylesheet {
            return;
        }
        let Some(href) = attributes.get("href").map(|h| h.trim()).filter(|h| !h.is_empty()) else {
            ctx.report(Diagnostic::markup("<link rel=\"stylesheet\"> without href ignored"));
            return;
        };
        if let Some(media) = attributes.get("media")
            && !media_matches(media, &ctx.config().media)
        {
            log::debug!("Stylesheet '{}' skipped for media '{}'", href, media);
            return;
        }
        match self.resources.load(href) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                log::debug!("Loaded linked stylesheet '{}' ({} bytes)", href, bytes.len());
                self.register(&text, ctx);
            }
            Err(err) => {
                ctx.report(Diagnostic::resource(format!("Stylesheet '{}' unavailable: {}", href, err)));
            }
        }
    }

    fn register(&mut self, source: &str, ctx: &mut Context) {
        let medium = ctx.config().media.clone();
        let (sheet, diagnostics) = StylesheetParser::new()
            .with_medium(medium)
            .with_resources(self.resources.as_ref())
            .parse(source);
        ctx.extend_diagnostics(diagnostics);
        let has_page_rules = !sheet.page.is_empty();
        self.resolver.add_stylesheet(Arc::new(sheet));
        if has_page_rules {
            self.request_layout(ctx);
        }
    }

    /// Combines the configured page with every `@page` rule seen so far.
    fn request_layout(&self, ctx: &mut Context) {
        let settings = self.resolver.page_settings();
        let page = &ctx.config().page;
        let layout = PageLayout {
            size: settings.size.clone().unwrap_or_else(|| page.size.clone()),
            margins: settings.apply_margins(&page.margins),
        };
        ctx.request_page_layout(layout);
    }

    fn close(&mut self, tag: &str, ctx: &mut Context, queue: &mut EventQueue) -> Flow {
        let Some(position) = self.elements.iter().rposition(|e| e.tag == tag) else {
            ctx.report(Diagnostic::markup(format!("Closing tag </{}> has no open element", tag)));
            return Flow::Consumed;
        };
        if position + 1 < self.elements.len() {
            for open in self.elements[position + 1..].iter().rev() {
                log::debug!("Auto-closing <{}> before </{}>", open.tag, tag);
                queue.push(Event::end(open.tag.clone()));
            }
            queue.push(Event::end(tag));
            return Flow::Consumed;
        }

        if tag == "style" {
            let body = std::mem::take(ctx.stage_state::<StyleBody>());
            if body.open && body.applies {
                self.register(&body.text, ctx);
            }
        }
        self.elements.pop();
        self.child_counts.pop();
        ctx.pop_style();
        Flow::Continue
    }

    pub fn stylesheets(&self) -> &[Arc<Stylesheet>] {
        self.resolver.stylesheets()
    }
}

impl Stage for CssStage {
    fn name(&self) -> &'static str {
        "css"
    }

    fn process(
        &mut self,
        event: &Event,
        ctx: &mut Context,
        queue: &mut EventQueue,
    ) -> Result<Flow, ConversionError> {
        let flow = match event {
            Event::DocumentStart => {
                self.request_layout(ctx);
                Flow::Continue
            }
            Event::ElementStart { tag, attributes } => {
                self.open(tag, attributes, ctx);
                Flow::Continue
            }
            Event::Text(text) => {
                let body = ctx.stage_state::<StyleBody>();
                if body.open {
                    body.text.push_str(text);
                }
                Flow::Continue
            }
            Event::ElementEnd { tag } => self.close(tag, ctx, queue),
            Event::DocumentEnd => {
                if self.elements.is_empty() {
                    Flow::Continue
                } else {
                    for open in self.elements.iter().rev() {
                        log::debug!("Auto-closing <{}> at end of document", open.tag);
                        queue.push(Event::end(open.tag.clone()));
                    }
                    queue.push(Event::DocumentEnd);
                    Flow::Consumed
                }
            }
        };
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::pipeline::Pipeline;
    use sheaf_css::user_agent::user_agent_stylesheet;
    use sheaf_style::PageSize;
    use sheaf_traits::InMemoryResourceProvider;
    use sheaf_types::DiagnosticKind;

    fn stage(resources: InMemoryResourceProvider) -> CssStage {
        let resolver = CssResolver::new().with_user_agent(Arc::new(user_agent_stylesheet()));
        CssStage::new(resolver, Arc::new(resources))
    }

    fn ctx() -> Context {
        Context::new(Arc::new(ConversionConfig::default()))
    }

    fn start(tag: &str, attrs: &[(&str, &str)]) -> Event {
        Event::ElementStart {
            tag: tag.to_string(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_style_stack_follows_elements() {
        let mut pipeline = Pipeline::new().with_stage(stage(InMemoryResourceProvider::new()));
        let mut ctx = ctx();
        pipeline.feed(Event::DocumentStart, &mut ctx).unwrap();
        pipeline.feed(start("div", &[("style", "color: red")]), &mut ctx).unwrap();
        pipeline.feed(start("b", &[]), &mut ctx).unwrap();
        assert_eq!(ctx.style_depth(), 2);
        let bold = ctx.current_style().unwrap();
        assert!(bold.font_weight().is_bold());
        assert_eq!(bold.color().r, 255);

        pipeline.feed(Event::end("b"), &mut ctx).unwrap();
        let div = ctx.current_style().unwrap();
        assert!(!div.font_weight().is_bold());
        pipeline.feed(Event::end("div"), &mut ctx).unwrap();
        assert_eq!(ctx.style_depth(), 0);
    }

    #[test]
    fn test_style_element_applies_to_following_elements() {
        let mut pipeline = Pipeline::new().with_stage(stage(InMemoryResourceProvider::new()));
        let mut ctx = ctx();
        for event in [
            Event::DocumentStart,
            start("style", &[]),
            Event::Text("p { color: #00ff00 } @page { size: letter; margin: 1in }".to_string()),
            Event::end("style"),
            start("p", &[]),
        ] {
            pipeline.feed(event, &mut ctx).unwrap();
        }
        assert_eq!(ctx.current_style().unwrap().color().g, 255);
        let layout = ctx.take_page_layout().unwrap();
        assert_eq!(layout.size, PageSize::Letter);
        assert_eq!(layout.margins.left, 72.0);
    }

    #[test]
    fn test_style_for_other_media_is_ignored() {
        let mut pipeline = Pipeline::new().with_stage(stage(InMemoryResourceProvider::new()));
        let mut ctx = ctx();
        for event in [
            Event::DocumentStart,
            start("style", &[("media", "screen")]),
            Event::Text("p { color: #00ff00 }".to_string()),
            Event::end("style"),
            start("p", &[]),
        ] {
            pipeline.feed(event, &mut ctx).unwrap();
        }
        assert_eq!(ctx.current_style().unwrap().color().g, 0);
    }

    #[test]
    fn test_linked_stylesheet_loads_and_missing_one_is_reported() {
        let resources = InMemoryResourceProvider::new();
        resources.add("css/site.css", b"p { font-style: italic }".to_vec()).unwrap();
        let mut pipeline = Pipeline::new().with_stage(stage(resources));
        let mut ctx = ctx();
        for event in [
            Event::DocumentStart,
            start("link", &[("rel", "stylesheet"), ("href", "css/site.css")]),
            Event::end("link"),
            start("link", &[("rel", "stylesheet"), ("href", "css/missing.css")]),
            Event::end("link"),
            start("p", &[]),
        ] {
            pipeline.feed(event, &mut ctx).unwrap();
        }
        assert!(ctx.current_style().unwrap().font_style().is_slanted());
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].kind, DiagnosticKind::Resource);
    }

    #[test]
    fn test_first_child_counts_per_parent() {
        let css = InMemoryResourceProvider::new();
        let mut pipeline = Pipeline::new().with_stage(stage(css));
        let mut ctx = ctx();
        for event in [
            Event::DocumentStart,
            start("style", &[]),
            Event::Text("li:first-child { color: blue }".to_string()),
            Event::end("style"),
            start("ul", &[]),
            start("li", &[]),
        ] {
            pipeline.feed(event, &mut ctx).unwrap();
        }
        assert_eq!(ctx.current_style().unwrap().color().b, 255);
        pipeline.feed(Event::end("li"), &mut ctx).unwrap();
        pipeline.feed(start("li", &[]), &mut ctx).unwrap();
        assert_eq!(ctx.current_style().unwrap().color().b, 0);
    }

    #[test]
    fn test_crossed_close_is_repaired() {
        let mut pipeline = Pipeline::new().with_stage(stage(InMemoryResourceProvider::new()));
        let mut ctx = ctx();
        for event in [Event::DocumentStart, start("b", &[]), start("i", &[]), Event::end("b")] {
            pipeline.feed(event, &mut ctx).unwrap();
        }
        assert_eq!(ctx.style_depth(), 0);

        pipeline.feed(Event::end("i"), &mut ctx).unwrap();
        assert_eq!(ctx.diagnostics()[0].kind, DiagnosticKind::Markup);
    }

    #[test]
    fn test_document_end_closes_everything() {
        let mut pipeline = Pipeline::new().with_stage(stage(InMemoryResourceProvider::new()));
        let mut ctx = ctx();
        for event in [Event::DocumentStart, start("div", &[]), start("p", &[]), Event::DocumentEnd] {
            pipeline.feed(event, &mut ctx).unwrap();
        }
        assert_eq!(ctx.style_depth(), 0);
    }
}
