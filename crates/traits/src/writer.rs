//! The output side of a conversion.
//!
//! A `DocumentWriter` receives finished top-level blocks in document order and
//! owns everything below that: pages, fonts, cross references. Bookmarks are
//! registered against the position the next block will start at.

use sheaf_idf::{Bookmark, ContentNode};
use sheaf_style::{Margins, PageSize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Writer used out of order: {0}")]
    InvalidState(&'static str),
}

/// A location in the output: a zero-based page index and a vertical offset
/// from the top of that page's content area, in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InsertionPoint {
    pub page: usize,
    pub y: f32,
}

/// Page geometry requested by configuration or an `@page` rule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    pub size: PageSize,
    pub margins: Margins,
}

pub trait DocumentWriter {
    fn begin_document(&mut self) -> Result<(), WriterError>;

    /// Lays out one top-level block and returns where it starts.
    fn emit_block(&mut self, node: &ContentNode) -> Result<InsertionPoint, WriterError>;

    /// Where the next block will be placed.
    fn position(&self) -> InsertionPoint;

    fn register_bookmark(&mut self, bookmark: &Bookmark, at: InsertionPoint) -> Result<(), WriterError>;

    fn end_document(&mut self) -> Result<(), WriterError>;

    /// Applies to pages started after the call.
    fn set_page_layout(&mut self, _layout: &PageLayout) -> Result<(), WriterError> {
        Ok(())
    }

    fn set_title(&mut self, _title: &str) {}
}

impl<W: DocumentWriter + ?Sized> DocumentWriter for &mut W {
    fn begin_document(&mut self) -> Result<(), WriterError> {
        (**self).begin_document()
    }

    fn emit_block(&mut self, node: &ContentNode) -> Result<InsertionPoint, WriterError> {
        (**self).emit_block(node)
    }

    fn position(&self) -> InsertionPoint {
        (**self).position()
    }

    fn register_bookmark(&mut self, bookmark: &Bookmark, at: InsertionPoint) -> Result<(), WriterError> {
        (**self).register_bookmark(bookmark, at)
    }

    fn end_document(&mut self) -> Result<(), WriterError> {
        (**self).end_document()
    }

    fn set_page_layout(&mut self, layout: &PageLayout) -> Result<(), WriterError> {
        (**self).set_page_layout(layout)
    }

    fn set_title(&mut self, title: &str) {
        (**self).set_title(title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Begin,
    Block { node: ContentNode, at: InsertionPoint },
    Bookmark { bookmark: Bookmark, at: InsertionPoint },
    PageLayout(PageLayout),
    Title(String),
    End,
}

/// A writer that keeps every call for inspection. Each block advances the
/// vertical position by one unit; a `PageBreak` block starts a new page.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub calls: Vec<RecordedCall>,
    cursor: InsertionPoint,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> Vec<&ContentNode> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Block { node, .. } => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn bookmarks(&self) -> Vec<(&Bookmark, InsertionPoint)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Bookmark { bookmark, at } => Some((bookmark, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn page_count(&self) -> usize {
        self.cursor.page + 1
    }
}

impl DocumentWriter for RecordingWriter {
    fn begin_document(&mut self) -> Result<(), WriterError> {
        if !self.calls.is_empty() {
            return Err(WriterError::InvalidState("begin_document called twice"));
        }
        self.calls.push(RecordedCall::Begin);
        Ok(())
    }

    fn emit_block(&mut self, node: &ContentNode) -> Result<InsertionPoint, WriterError> {
        let at = self.cursor;
        self.calls.push(RecordedCall::Block { node: node.clone(), at });
        if matches!(node, ContentNode::PageBreak) {
            self.cursor = InsertionPoint { page: at.page + 1, y: 0.0 };
        } else {
            self.cursor.y += 1.0;
        }
        Ok(at)
    }

    fn position(&self) -> InsertionPoint {
        self.cursor
    }

    fn register_bookmark(&mut self, bookmark: &Bookmark, at: InsertionPoint) -> Result<(), WriterError> {
        self.calls.push(RecordedCall::Bookmark { bookmark: bookmark.clone(), at });
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), WriterError> {
        self.calls.push(RecordedCall::End);
        Ok(())
    }

    fn set_page_layout(&mut self, layout: &PageLayout) -> Result<(), WriterError> {
        self.calls.push(RecordedCall::PageLayout(layout.clone()));
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.calls.push(RecordedCall::Title(title.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_idf::NodeMetadata;

    #[test]
    fn test_recording_writer_tracks_pages() {
        let mut writer = RecordingWriter::new();
        writer.begin_document().unwrap();
        let first = writer.emit_block(&ContentNode::division(NodeMetadata::default())).unwrap();
        writer.emit_block(&ContentNode::PageBreak).unwrap();
        let third = writer.emit_block(&ContentNode::division(NodeMetadata::default())).unwrap();
        writer.end_document().unwrap();

        assert_eq!(first, InsertionPoint { page: 0, y: 0.0 });
        assert_eq!(third, InsertionPoint { page: 1, y: 0.0 });
        assert_eq!(writer.page_count(), 2);
        assert_eq!(writer.blocks().len(), 3);
        assert!(writer.begin_document().is_err());
    }
}
