//! Hands finished blocks to the document writer.

use crate::context::Context;
use crate::error::ConversionError;
use crate::pipeline::{EventQueue, Flow, Stage};
use sheaf_idf::ContentNode;
use sheaf_markup::Event;
use sheaf_traits::{DocumentWriter, InsertionPoint};

/// The last stage. After every event it drains the blocks the earlier stages
/// queued, registering each block's bookmarks at the position the block is
/// about to occupy.
pub struct SinkStage<W: DocumentWriter> {
    writer: W,
    title_written: bool,
}

impl<W: DocumentWriter> SinkStage<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            title_written: false,
        }
    }

    fn apply_layout(&mut self, ctx: &mut Context) -> Result<(), ConversionError> {
        if let Some(layout) = ctx.take_page_layout() {
            let (width, height) = layout.size.dimensions_pt();
            log::debug!("Page layout {}x{}pt", width, height);
            self.writer.set_page_layout(&layout)?;
        }
        Ok(())
    }

    /// Registers the node's bookmarks at the current position, then lays the
    /// node out.
    pub fn emit(&mut self, node: &ContentNode, ctx: &mut Context) -> Result<InsertionPoint, ConversionError> {
        let at = self.writer.position();
        let bookmarks = node.bookmarks();
        for bookmark in &bookmarks {
            self.writer.register_bookmark(bookmark, at)?;
        }
        let placed = self.writer.emit_block(node)?;

        let stats = ctx.run_stats_mut();
        stats.blocks += 1;
        stats.bookmarks += bookmarks.len();
        stats.pages = stats.pages.max(placed.page + 1);
        Ok(placed)
    }

    fn drain(&mut self, ctx: &mut Context) -> Result<(), ConversionError> {
        while let Some(node) = ctx.take_output() {
            self.emit(&node, ctx)?;
        }
        Ok(())
    }
}

impl<W: DocumentWriter> Stage for SinkStage<W> {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn process(
        &mut self,
        event: &Event,
        ctx: &mut Context,
        _queue: &mut EventQueue,
    ) -> Result<Flow, ConversionError> {
        if matches!(event, Event::DocumentStart) {
            self.writer.begin_document()?;
            self.title_written = false;
        }
        self.apply_layout(ctx)?;
        self.drain(ctx)?;

        if matches!(event, Event::DocumentEnd) {
            if !self.title_written
                && let Some(title) = ctx.title()
            {
                self.writer.set_title(title.trim());
                self.title_written = true;
            }
            let end = self.writer.position();
            let stats = ctx.run_stats_mut();
            stats.pages = stats.pages.max(end.page + 1);
            self.writer.end_document()?;
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::pipeline::Pipeline;
    use sheaf_idf::{Bookmark, NodeMetadata};
    use sheaf_traits::{PageLayout, RecordedCall, RecordingWriter};
    use std::sync::Arc;

    fn heading(name: &str) -> ContentNode {
        let meta = NodeMetadata {
            bookmark: Some(Bookmark {
                name: name.to_string(),
                title: name.to_string(),
                level: 1,
            }),
            ..NodeMetadata::for_tag("h1")
        };
        ContentNode::Heading {
            meta,
            level: 1,
            children: Vec::new(),
        }
    }

    #[test]
    fn test_blocks_and_bookmarks_reach_writer_in_order() {
        let mut writer = RecordingWriter::new();
        let mut ctx = Context::new(Arc::new(ConversionConfig::default()));
        {
            let mut pipeline = Pipeline::new().with_stage(SinkStage::new(&mut writer));
            pipeline.feed(Event::DocumentStart, &mut ctx).unwrap();
            ctx.emit(heading("1-h1"));
            ctx.emit(ContentNode::PageBreak);
            ctx.emit(heading("2-h1"));
            ctx.append_title("Report ");
            pipeline.feed(Event::DocumentEnd, &mut ctx).unwrap();
        }

        let marks = writer.bookmarks();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].1, InsertionPoint { page: 0, y: 0.0 });
        assert_eq!(marks[1].1, InsertionPoint { page: 1, y: 0.0 });
        assert!(writer.calls.contains(&RecordedCall::Title("Report".to_string())));
        assert_eq!(writer.calls.last(), Some(&RecordedCall::End));

        let stats = ctx.run_stats();
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.bookmarks, 2);
        assert_eq!(stats.pages, 2);
    }

    #[test]
    fn test_page_layout_applied_before_blocks() {
        let mut writer = RecordingWriter::new();
        let mut ctx = Context::new(Arc::new(ConversionConfig::default()));
        ctx.request_page_layout(PageLayout::default());
        {
            let mut pipeline = Pipeline::new().with_stage(SinkStage::new(&mut writer));
            pipeline.feed(Event::DocumentStart, &mut ctx).unwrap();
            ctx.emit(ContentNode::HorizontalRule { meta: NodeMetadata::default() });
            pipeline.feed(Event::DocumentEnd, &mut ctx).unwrap();
        }
        assert!(matches!(writer.calls[0], RecordedCall::Begin));
        assert!(matches!(writer.calls[1], RecordedCall::PageLayout(_)));
        assert!(matches!(writer.calls[2], RecordedCall::Block { .. }));
    }
}
