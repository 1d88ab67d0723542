//! Maps elements to content nodes.
//!
//! Every open element has a frame on the context's frame stack. Text goes to
//! the nearest frame that holds a node, after the handlers of the frames on the
//! way had a chance to intercept it. A closed node is appended to the nearest
//! enclosing node, or queued for the sink when there is none.

use crate::context::{Context, Frame};
use crate::error::ConversionError;
use crate::fonts::FontResolver;
use crate::handlers::{HandlerCtx, HandlerEffects, HandlerRegistry, TextFlow};
use crate::pipeline::{EventQueue, Flow, Stage};
use crate::repair::place;
use sheaf_idf::{ContentNode, TextRun};
use sheaf_markup::{Attributes, Event};
use sheaf_style::StyleMap;
use sheaf_traits::ResourceProvider;
use sheaf_types::Diagnostic;
use std::sync::Arc;

pub struct TagStage {
    registry: Arc<HandlerRegistry>,
    fonts: FontResolver,
    resources: Arc<dyn ResourceProvider>,
    /// Inline content found outside any block, held until the next block.
    loose: Option<ContentNode>,
}

impl TagStage {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        fonts: FontResolver,
        resources: Arc<dyn ResourceProvider>,
    ) -> Self {
        Self {
            registry,
            fonts,
            resources,
            loose: None,
        }
    }

    fn apply(effects: HandlerEffects, ctx: &mut Context) {
        ctx.counters = effects.counters;
        ctx.extend_diagnostics(effects.diagnostics);
        if !effects.title.is_empty() {
            ctx.append_title(&effects.title);
        }
    }

    fn open(&mut self, tag: &str, attributes: &Attributes, ctx: &mut Context) {
        let style = ctx.current_style().unwrap_or_default();
        let handler = self.registry.resolve(tag);
        let inside_dropped = ctx.frames.last().is_some_and(|f| f.suppressed);

        let suppressed = if inside_dropped {
            true
        } else if style.is_hidden() && !matches!(tag, "html" | "body") {
            log::debug!("<{}> has display: none; dropping its subtree", tag);
            true
        } else if self.registry.lookup(tag).is_none() {
            if ctx.config().accept_unknown_tags {
                log::debug!("Unknown element <{}> treated as transparent", tag);
                false
            } else {
                ctx.report(Diagnostic::unsupported(format!(
                    "Unknown element <{}> dropped with its content",
                    tag
                )));
                true
            }
        } else {
            false
        };

        if suppressed {
            ctx.frames.push(Frame {
                tag: tag.to_string(),
                style,
                node: None,
                handler,
                suppressed: true,
                split: false,
            });
            return;
        }

        if style.page_break_before() {
            self.deliver(ContentNode::PageBreak, ctx);
        }

        let config = ctx.shared_config();
        let mut cx = HandlerCtx::new(
            tag,
            attributes,
            &style,
            &config,
            self.resources.as_ref(),
            ctx.counters,
        );
        let node = self.registry.get(handler).open(&mut cx);
        Self::apply(cx.finish(), ctx);

        ctx.frames.push(Frame {
            tag: tag.to_string(),
            style,
            node,
            handler,
            suppressed: false,
            split: false,
        });
    }

    fn text_run(&self, text: &str, style: &StyleMap) -> TextRun {
        let size = style.font_size();
        let weight = style.font_weight();
        let font_style = style.font_style();
        let font = self.fonts.resolve(&style.font_families(), &weight, &font_style, size);
        TextRun {
            text: text.to_string(),
            font,
            size,
            color: style.color(),
            decoration: style.text_decoration(),
        }
    }

    fn text(&mut self, text: &str, ctx: &mut Context) {
        if text.is_empty() || ctx.frames.last().is_some_and(|f| f.suppressed) {
            return;
        }
        let style = ctx.current_style().unwrap_or_default();
        let mut run = self.text_run(text, &style);
        let config = ctx.shared_config();
        let none = Attributes::new();

        for index in (0..ctx.frames.len()).rev() {
            let counters = ctx.counters;
            let Frame {
                tag,
                style,
                node,
                handler,
                ..
            } = &mut ctx.frames[index];
            let mut cx = HandlerCtx::new(
                tag,
                &none,
                style,
                &config,
                self.resources.as_ref(),
                counters,
            );
            let flow = self.registry.get(*handler).append_text(node.as_mut(), run, &mut cx);
            let holds_node = node.is_some();
            Self::apply(cx.finish(), ctx);
            match flow {
                TextFlow::Consumed => return,
                TextFlow::Pass(passed) if holds_node => {
                    self.deliver_within(index + 1, ContentNode::TextRun(passed), ctx);
                    return;
                }
                TextFlow::Pass(passed) => run = passed,
            }
        }
        self.deliver_top(ContentNode::TextRun(run), ctx);
    }

    fn close(&mut self, tag: &str, ctx: &mut Context) {
        let Some(position) = ctx.frames.iter().rposition(|f| f.tag == tag) else {
            ctx.report(Diagnostic::markup(format!(
                "Closing tag </{}> has no open element",
                tag
            )));
            return;
        };
        while ctx.frames.len() > position + 1 {
            if let Some(frame) = ctx.frames.pop() {
                log::debug!("Auto-closing <{}> before </{}>", frame.tag, tag);
                self.finish_frame(frame, ctx);
            }
        }
        if let Some(frame) = ctx.frames.pop() {
            self.finish_frame(frame, ctx);
        }
    }

    fn finish_frame(&mut self, frame: Frame, ctx: &mut Context) {
        if frame.suppressed {
            return;
        }
        let handler = Arc::clone(self.registry.get(frame.handler));
        let config = ctx.shared_config();
        let none = Attributes::new();
        let mut cx = HandlerCtx::new(
            &frame.tag,
            &none,
            &frame.style,
            &config,
            self.resources.as_ref(),
            ctx.counters,
        );
        let split = frame.split;
        let node = frame
            .node
            .filter(|node| !(split && holds_only_whitespace(node)))
            .and_then(|node| handler.close(node, &mut cx));
        Self::apply(cx.finish(), ctx);

        if let Some(node) = node {
            self.deliver(node, ctx);
        }
        if frame.style.page_break_after() {
            self.deliver(ContentNode::PageBreak, ctx);
        }
    }

    fn deliver(&mut self, child: ContentNode, ctx: &mut Context) {
        let limit = ctx.frames.len();
        self.deliver_within(limit, child, ctx);
    }

    /// Appends `child` to the innermost node among the first `limit` frames,
    /// promoting it outwards when that node cannot hold it even after repair.
    fn deliver_within(&mut self, limit: usize, mut child: ContentNode, ctx: &mut Context) {
        let mut rejected_by: Option<&'static str> = None;
        for index in (0..limit).rev() {
            let Some(parent) = ctx.frames[index].node.as_mut() else {
                continue;
            };
            let parent_kind = parent.kind();
            match place(parent, child) {
                Ok(()) => {
                    if let Some(kind) = rejected_by {
                        self.report_promotion(kind, parent_kind, ctx);
                    }
                    return;
                }
                Err(back) => {
                    rejected_by.get_or_insert(parent_kind);
                    if !back.is_inline() {
                        self.split_frame(index, ctx);
                    }
                    child = back;
                }
            }
        }
        if let Some(kind) = rejected_by {
            self.report_promotion(kind, "document", ctx);
        }
        self.deliver_top(child, ctx);
    }

    /// Closes the content an inline-only node gathered so far and delivers it
    /// ahead of the block that node rejected. The frame stays open with an
    /// empty node of the same kind for whatever follows the block.
    fn split_frame(&mut self, index: usize, ctx: &mut Context) {
        let frame = &mut ctx.frames[index];
        let Some(node) = frame.node.as_mut() else {
            return;
        };
        let inline_only = matches!(
            node,
            ContentNode::Paragraph { .. } | ContentNode::Heading { .. } | ContentNode::Link { .. }
        );
        if !inline_only || holds_only_whitespace(node) {
            return;
        }
        let Some(head) = node.split_off() else {
            return;
        };
        frame.split = true;
        let tag = frame.tag.clone();
        let style = Arc::clone(&frame.style);
        let handler = Arc::clone(self.registry.get(frame.handler));

        log::debug!("Closing <{}> early around a block it cannot hold", tag);
        let config = ctx.shared_config();
        let none = Attributes::new();
        let mut cx = HandlerCtx::new(
            &tag,
            &none,
            &style,
            &config,
            self.resources.as_ref(),
            ctx.counters,
        );
        let head = handler.close(head, &mut cx);
        Self::apply(cx.finish(), ctx);
        if let Some(head) = head {
            self.deliver_within(index, head, ctx);
        }
    }

    fn report_promotion(&self, from: &str, to: &str, ctx: &mut Context) {
        ctx.report(Diagnostic::markup(format!(
            "Content a {} cannot hold was moved up into the enclosing {}",
            from, to
        )));
    }

    /// Top level: blocks go to the sink, inline content gathers in an
    /// anonymous paragraph until the next block.
    fn deliver_top(&mut self, child: ContentNode, ctx: &mut Context) {
        if child.is_inline() {
            if self.loose.is_none() && matches!(&child, ContentNode::TextRun(run) if run.is_blank()) {
                return;
            }
            let paragraph = self.loose.get_or_insert_with(ContentNode::anonymous_paragraph);
            if let Err(err) = paragraph.append(child) {
                log::warn!("Dropped top-level content: {}", err);
            }
            return;
        }
        self.flush_loose(ctx);
        ctx.emit(child);
    }

    fn flush_loose(&mut self, ctx: &mut Context) {
        if let Some(paragraph) = self.loose.take() {
            if paragraph.is_empty_block() {
                return;
            }
            ctx.emit(paragraph);
        }
    }

    fn finish(&mut self, ctx: &mut Context) {
        while let Some(frame) = ctx.frames.pop() {
            log::debug!("Auto-closing <{}> at end of document", frame.tag);
            self.finish_frame(frame, ctx);
        }
        self.flush_loose(ctx);
    }
}

/// Nothing but blank text, directly or inside links.
fn holds_only_whitespace(node: &ContentNode) -> bool {
    node.children().iter().all(|child| match child {
        ContentNode::TextRun(run) => run.is_blank(),
        ContentNode::Link { .. } => holds_only_whitespace(child),
        _ => false,
    })
}

impl Stage for TagStage {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn process(
        &mut self,
        event: &Event,
        ctx: &mut Context,
        _queue: &mut EventQueue,
    ) -> Result<Flow, ConversionError> {
        match event {
            Event::DocumentStart => {
                self.loose = None;
            }
            Event::ElementStart { tag, attributes } => self.open(tag, attributes, ctx),
            Event::Text(text) => self.text(text, ctx),
            Event::ElementEnd { tag } => self.close(tag, ctx),
            Event::DocumentEnd => self.finish(ctx),
        }
        Ok(Flow::Continue)
    }
}
