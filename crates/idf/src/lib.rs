//! Intermediate Document Format (IDF)
//! This module defines the structured content tree the conversion stages build
//! and hand to a document writer, one finished top-level block at a time.

pub mod text;

pub use text::{FontHandle, TextRun};

use sheaf_style::{ListStyleType, Margins, TextAlign};
use sheaf_types::Color;
use std::fmt;
use std::sync::Arc;

// --- Shared Types ---

/// A reference-counted container for shared, immutable data like images and fonts.
pub type SharedData = Arc<Vec<u8>>;

/// Block-level presentation carried over from the element's cascaded style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStyle {
    pub margins: Margins,
    pub padding: Margins,
    pub text_align: TextAlign,
    pub background: Option<Color>,
    /// Line height in points; zero lets the writer derive it from the runs.
    pub line_height: f32,
}

/// A named destination in the output, rendered as an outline entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bookmark {
    pub name: String,
    pub title: String,
    pub level: u8,
}

/// Metadata shared by the container variants.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeMetadata {
    pub id: Option<String>,
    pub tag: String,
    pub style: BlockStyle,
    pub bookmark: Option<Bookmark>,
    /// Set on paragraphs created to hold inline content that arrived in a
    /// block-only container.
    pub anonymous: bool,
}

impl NodeMetadata {
    pub fn for_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }
}

/// Whether a paragraph breaks the line before an inline image that directly
/// follows text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphKind {
    #[default]
    Flowing,
    NoNewLine,
}

// --- Main Node Enum ---

#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    Paragraph {
        meta: NodeMetadata,
        kind: ParagraphKind,
        children: Vec<ContentNode>,
    },
    Heading {
        meta: NodeMetadata,
        level: u8,
        children: Vec<ContentNode>,
    },
    /// A generic block container.
    Division {
        meta: NodeMetadata,
        children: Vec<ContentNode>,
    },
    Table {
        meta: NodeMetadata,
        children: Vec<ContentNode>,
    },
    Row {
        meta: NodeMetadata,
        children: Vec<ContentNode>,
    },
    Cell {
        meta: NodeMetadata,
        header: bool,
        col_span: usize,
        row_span: usize,
        children: Vec<ContentNode>,
    },
    List {
        meta: NodeMetadata,
        ordered: bool,
        start: usize,
        marker: ListStyleType,
        children: Vec<ContentNode>,
    },
    ListItem {
        meta: NodeMetadata,
        children: Vec<ContentNode>,
    },
    Image {
        src: String,
        alt: Option<String>,
        data: Option<SharedData>,
        width: Option<f32>,
        height: Option<f32>,
    },
    TextRun(TextRun),
    LineBreak,
    Link {
        href: Option<String>,
        anchor: Option<String>,
        children: Vec<ContentNode>,
    },
    HorizontalRule {
        meta: NodeMetadata,
    },
    PageBreak,
}

/// Returned by [`ContentNode::append`] when the parent cannot hold the child.
/// The rejected child is handed back so the caller can repair or re-home it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendError {
    pub parent: &'static str,
    pub child: ContentNode,
}

impl fmt::Display for AppendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {} cannot contain a {}", self.parent, self.child.kind())
    }
}

impl std::error::Error for AppendError {}

impl ContentNode {
    pub fn paragraph(meta: NodeMetadata, kind: ParagraphKind) -> Self {
        ContentNode::Paragraph {
            meta,
            kind,
            children: Vec::new(),
        }
    }

    /// An anonymous paragraph wrapping stray inline content.
    pub fn anonymous_paragraph() -> Self {
        let meta = NodeMetadata {
            anonymous: true,
            ..NodeMetadata::default()
        };
        Self::paragraph(meta, ParagraphKind::NoNewLine)
    }

    pub fn division(meta: NodeMetadata) -> Self {
        ContentNode::Division {
            meta,
            children: Vec::new(),
        }
    }

    pub fn table(meta: NodeMetadata) -> Self {
        ContentNode::Table {
            meta,
            children: Vec::new(),
        }
    }

    pub fn row(meta: NodeMetadata) -> Self {
        ContentNode::Row {
            meta,
            children: Vec::new(),
        }
    }

    pub fn cell(meta: NodeMetadata) -> Self {
        ContentNode::Cell {
            meta,
            header: false,
            col_span: 1,
            row_span: 1,
            children: Vec::new(),
        }
    }

    pub fn list_item(meta: NodeMetadata) -> Self {
        ContentNode::ListItem {
            meta,
            children: Vec::new(),
        }
    }

    /// Returns a string identifier for the node type, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentNode::Paragraph { .. } => "paragraph",
            ContentNode::Heading { .. } => "heading",
            ContentNode::Division { .. } => "division",
            ContentNode::Table { .. } => "table",
            ContentNode::Row { .. } => "row",
            ContentNode::Cell { .. } => "cell",
            ContentNode::List { .. } => "list",
            ContentNode::ListItem { .. } => "list-item",
            ContentNode::Image { .. } => "image",
            ContentNode::TextRun(_) => "text-run",
            ContentNode::LineBreak => "line-break",
            ContentNode::Link { .. } => "link",
            ContentNode::HorizontalRule { .. } => "horizontal-rule",
            ContentNode::PageBreak => "page-break",
        }
    }

    /// Inline nodes flow inside a line; everything else stacks vertically.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            ContentNode::TextRun(_)
                | ContentNode::LineBreak
                | ContentNode::Image { .. }
                | ContentNode::Link { .. }
        )
    }

    pub fn meta(&self) -> Option<&NodeMetadata> {
        match self {
            ContentNode::Paragraph { meta, .. }
            | ContentNode::Heading { meta, .. }
            | ContentNode::Division { meta, .. }
            | ContentNode::Table { meta, .. }
            | ContentNode::Row { meta, .. }
            | ContentNode::Cell { meta, .. }
            | ContentNode::List { meta, .. }
            | ContentNode::ListItem { meta, .. }
            | ContentNode::HorizontalRule { meta } => Some(meta),
            _ => None,
        }
    }

    pub fn meta_mut(&mut self) -> Option<&mut NodeMetadata> {
        match self {
            ContentNode::Paragraph { meta, .. }
            | ContentNode::Heading { meta, .. }
            | ContentNode::Division { meta, .. }
            | ContentNode::Table { meta, .. }
            | ContentNode::Row { meta, .. }
            | ContentNode::Cell { meta, .. }
            | ContentNode::List { meta, .. }
            | ContentNode::ListItem { meta, .. }
            | ContentNode::HorizontalRule { meta } => Some(meta),
            _ => None,
        }
    }

    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Paragraph { children, .. }
            | ContentNode::Heading { children, .. }
            | ContentNode::Division { children, .. }
            | ContentNode::Table { children, .. }
            | ContentNode::Row { children, .. }
            | ContentNode::Cell { children, .. }
            | ContentNode::List { children, .. }
            | ContentNode::ListItem { children, .. }
            | ContentNode::Link { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<ContentNode>> {
        match self {
            ContentNode::Paragraph { children, .. }
            | ContentNode::Heading { children, .. }
            | ContentNode::Division { children, .. }
            | ContentNode::Table { children, .. }
            | ContentNode::Row { children, .. }
            | ContentNode::Cell { children, .. }
            | ContentNode::List { children, .. }
            | ContentNode::ListItem { children, .. }
            | ContentNode::Link { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Splits off the children appended so far into a node of the same kind,
    /// leaving `self` empty to continue with later content. The part returned
    /// keeps the id, anchor and bookmark; the continuation drops them so they
    /// are not emitted twice. Returns `None` when there is nothing to split.
    pub fn split_off(&mut self) -> Option<ContentNode> {
        let children = std::mem::take(self.children_mut().filter(|c| !c.is_empty())?);
        let mut head = self.clone();
        if let Some(slot) = head.children_mut() {
            *slot = children;
        }
        if let Some(meta) = self.meta_mut() {
            meta.id = None;
            meta.bookmark = None;
        }
        if let ContentNode::Link { anchor, .. } = self {
            *anchor = None;
        }
        Some(head)
    }

    /// Whether `child` may be appended directly, without repair.
    pub fn accepts(&self, child: &ContentNode) -> bool {
        match self {
            ContentNode::Paragraph { .. }
            | ContentNode::Heading { .. }
            | ContentNode::Link { .. } => child.is_inline(),
            ContentNode::Division { .. }
            | ContentNode::ListItem { .. }
            | ContentNode::Cell { .. } => {
                !child.is_inline()
                    && !matches!(
                        child,
                        ContentNode::Row { .. } | ContentNode::Cell { .. } | ContentNode::ListItem { .. }
                    )
            }
            ContentNode::Table { .. } => matches!(child, ContentNode::Row { .. }),
            ContentNode::Row { .. } => matches!(child, ContentNode::Cell { .. }),
            ContentNode::List { .. } => matches!(child, ContentNode::ListItem { .. }),
            _ => false,
        }
    }

    /// Appends a child, enforcing the containment rules.
    ///
    /// A flowing paragraph inserts a `LineBreak` when an image directly follows
    /// a text run; a `NoNewLine` paragraph keeps them on one line.
    pub fn append(&mut self, child: ContentNode) -> Result<(), AppendError> {
        if !self.accepts(&child) {
            return Err(AppendError {
                parent: self.kind(),
                child,
            });
        }
        if let ContentNode::Paragraph {
            kind: ParagraphKind::Flowing,
            children,
            ..
        } = self
            && matches!(child, ContentNode::Image { .. })
            && matches!(children.last(), Some(ContentNode::TextRun(_)))
        {
            children.push(ContentNode::LineBreak);
        }
        match self.children_mut() {
            Some(children) => {
                children.push(child);
                Ok(())
            }
            None => Err(AppendError {
                parent: self.kind(),
                child,
            }),
        }
    }

    /// Concatenated text of all runs below this node, whitespace-normalized.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            ContentNode::TextRun(run) => out.push_str(&run.text),
            ContentNode::LineBreak => out.push(' '),
            _ => {
                for child in self.children() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// All bookmarks in this subtree, in document order.
    pub fn bookmarks(&self) -> Vec<&Bookmark> {
        let mut found = Vec::new();
        self.collect_bookmarks(&mut found);
        found
    }

    fn collect_bookmarks<'a>(&'a self, out: &mut Vec<&'a Bookmark>) {
        if let Some(bookmark) = self.meta().and_then(|m| m.bookmark.as_ref()) {
            out.push(bookmark);
        }
        for child in self.children() {
            child.collect_bookmarks(out);
        }
    }

    /// True when the node would produce no visible output.
    pub fn is_empty_block(&self) -> bool {
        match self {
            ContentNode::Paragraph { children, .. } | ContentNode::Heading { children, .. } => {
                children.iter().all(|c| match c {
                    ContentNode::TextRun(run) => run.is_blank(),
                    ContentNode::Link { .. } => c.text_content().is_empty(),
                    _ => false,
                })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_style::{FontStyle, FontWeight, TextDecoration};

    fn run(text: &str) -> ContentNode {
        ContentNode::TextRun(TextRun {
            text: text.to_string(),
            font: FontHandle {
                family: "Helvetica".into(),
                postscript_name: "Helvetica".into(),
                weight: FontWeight::Regular,
                style: FontStyle::Normal,
                data: None,
            },
            size: 12.0,
            color: Color::BLACK,
            decoration: TextDecoration::None,
        })
    }

    fn image() -> ContentNode {
        ContentNode::Image {
            src: "a.png".into(),
            alt: None,
            data: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_flowing_paragraph_breaks_before_image_after_text() {
        let mut p = ContentNode::paragraph(NodeMetadata::for_tag("p"), ParagraphKind::Flowing);
        p.append(run("before")).unwrap();
        p.append(image()).unwrap();
        let kinds: Vec<_> = p.children().iter().map(ContentNode::kind).collect();
        assert_eq!(kinds, vec!["text-run", "line-break", "image"]);
    }

    #[test]
    fn test_no_new_line_paragraph_keeps_image_inline() {
        let mut p = ContentNode::paragraph(NodeMetadata::for_tag("span"), ParagraphKind::NoNewLine);
        p.append(run("before")).unwrap();
        p.append(image()).unwrap();
        let kinds: Vec<_> = p.children().iter().map(ContentNode::kind).collect();
        assert_eq!(kinds, vec!["text-run", "image"]);
    }

    #[test]
    fn test_containment_rules() {
        let mut table = ContentNode::table(NodeMetadata::for_tag("table"));
        let err = table.append(ContentNode::cell(NodeMetadata::for_tag("td"))).unwrap_err();
        assert_eq!(err.parent, "table");
        assert_eq!(err.child.kind(), "cell");
        assert!(table.append(ContentNode::row(NodeMetadata::for_tag("tr"))).is_ok());

        let mut leaf = ContentNode::LineBreak;
        assert!(leaf.append(run("x")).is_err());

        let mut div = ContentNode::division(NodeMetadata::for_tag("div"));
        assert!(div.append(run("loose text")).is_err());
        assert!(div.append(ContentNode::anonymous_paragraph()).is_ok());
    }

    #[test]
    fn test_bookmarks_in_document_order() {
        let mut div = ContentNode::division(NodeMetadata::default());
        for (i, title) in ["One", "Two"].iter().enumerate() {
            let meta = NodeMetadata {
                bookmark: Some(Bookmark {
                    name: format!("{}-h1", i + 1),
                    title: title.to_string(),
                    level: 1,
                }),
                ..NodeMetadata::default()
            };
            div.append(ContentNode::Heading { meta, level: 1, children: vec![] }).unwrap();
        }
        let names: Vec<_> = div.bookmarks().iter().map(|b| b.name.clone()).collect();
        assert_eq!(names, vec!["1-h1", "2-h1"]);
    }

    #[test]
    fn test_split_off_keeps_identity_on_the_first_part() {
        let meta = NodeMetadata {
            id: Some("intro".into()),
            bookmark: Some(Bookmark { name: "1-h1".into(), title: String::new(), level: 1 }),
            ..NodeMetadata::for_tag("h1")
        };
        let mut heading = ContentNode::Heading { meta, level: 1, children: vec![] };
        assert_eq!(heading.split_off(), None);

        heading.append(run("Title")).unwrap();
        let head = heading.split_off().unwrap();
        assert_eq!(head.text_content(), "Title");
        assert_eq!(head.meta().and_then(|m| m.id.as_deref()), Some("intro"));
        assert_eq!(head.bookmarks().len(), 1);

        assert!(heading.children().is_empty());
        assert_eq!(heading.kind(), "heading");
        assert!(heading.bookmarks().is_empty());
        assert_eq!(heading.meta().and_then(|m| m.id.clone()), None);

        let mut link = ContentNode::Link { href: Some("x".into()), anchor: Some("a".into()), children: vec![] };
        link.append(run("first")).unwrap();
        let head = link.split_off().unwrap();
        assert!(matches!(head, ContentNode::Link { anchor: Some(_), .. }));
        assert!(matches!(link, ContentNode::Link { href: Some(_), anchor: None, .. }));
    }

    #[test]
    fn test_text_content_normalizes_whitespace() {
        let mut h = ContentNode::Heading { meta: NodeMetadata::default(), level: 2, children: vec![] };
        h.append(run("  Intro ")).unwrap();
        h.append(ContentNode::LineBreak).unwrap();
        h.append(run("part")).unwrap();
        assert_eq!(h.text_content(), "Intro part");
    }
}
