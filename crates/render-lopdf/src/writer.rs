//! A [`DocumentWriter`] that paginates blocks and saves a PDF with lopdf.
//!
//! Blocks are laid out as they arrive and their drawing operations kept per
//! page. The lopdf document is only assembled in `end_document`, once every
//! page, anchor and bookmark is known.

use crate::error::RenderError;
use crate::flow::{Item, Line, LinkArea, LinkTarget, Resources, Unit, layout_block};
use crate::fonts::{FontTable, to_win_ansi};
use crate::images::ImageTable;
use crate::outline::{OutlineEntry, build_outline, text_string};
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, StringFormat, Stream, dictionary};
use sheaf_idf::{Bookmark, ContentNode};
use sheaf_style::Margins;
use sheaf_traits::{DocumentWriter, InsertionPoint, PageLayout, WriterError};
use sheaf_types::Color;
use std::collections::HashMap;
use std::io::Write;

struct Page {
    width: f32,
    height: f32,
    margins: Margins,
    operations: Vec<Operation>,
    links: Vec<([f32; 4], LinkTarget)>,
}

impl Page {
    fn new(layout: &PageLayout) -> Self {
        let (width, height) = layout.size.dimensions_pt();
        Self {
            width,
            height,
            margins: layout.margins.clone(),
            operations: Vec::new(),
            links: Vec::new(),
        }
    }

    fn content_height(&self) -> f32 {
        (self.height - self.margins.vertical()).max(1.0)
    }

    /// PDF y coordinate of a content-area offset.
    fn pdf_y(&self, offset: f32) -> f32 {
        self.height - self.margins.top - offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Open,
    Finished,
}

pub struct PdfDocumentWriter<W: Write> {
    out: W,
    state: State,
    layout: PageLayout,
    pages: Vec<Page>,
    /// Offset of the next unit from the top of the current page's content area.
    cursor: f32,
    break_pending: bool,
    fonts: FontTable,
    images: ImageTable,
    pending_bookmarks: Vec<Bookmark>,
    outline: Vec<(Bookmark, InsertionPoint)>,
    anchors: HashMap<String, InsertionPoint>,
    title: Option<String>,
    creation_date: Option<DateTime<Utc>>,
}

impl<W: Write> PdfDocumentWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: State::Idle,
            layout: PageLayout::default(),
            pages: Vec::new(),
            cursor: 0.0,
            break_pending: false,
            fonts: FontTable::new(),
            images: ImageTable::new(),
            pending_bookmarks: Vec::new(),
            outline: Vec::new(),
            anchors: HashMap::new(),
            title: None,
            creation_date: Some(Utc::now()),
        }
    }

    /// Page geometry used until a layout arrives from the document.
    pub fn with_page_layout(mut self, layout: PageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Fixes the creation date written to the info dictionary; `None` omits it.
    pub fn with_creation_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.creation_date = date;
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn ensure_open(&self) -> Result<(), WriterError> {
        match self.state {
            State::Open => Ok(()),
            State::Idle => Err(WriterError::InvalidState("block emitted before begin_document")),
            State::Finished => Err(WriterError::InvalidState("block emitted after end_document")),
        }
    }

    fn at_page_top(&self) -> bool {
        self.pages.is_empty() || self.break_pending || self.cursor == 0.0
    }

    fn start_page(&mut self) {
        self.pages.push(Page::new(&self.layout));
        self.cursor = 0.0;
        self.break_pending = false;
        log::debug!("Started page {}", self.pages.len());
    }

    fn page_break(&mut self) {
        if self.at_page_top() {
            log::debug!("Ignoring page break at the top of a page");
        } else {
            self.break_pending = true;
        }
    }

    /// Places one unit, starting a new page when it does not fit.
    fn place(&mut self, line: Line) -> InsertionPoint {
        if self.pages.is_empty() || self.break_pending {
            self.start_page();
        } else if self.cursor > 0.0
            && let Some(page) = self.pages.last()
            && self.cursor + line.height > page.content_height()
        {
            self.start_page();
        }
        let page_index = self.pages.len() - 1;
        let at = InsertionPoint {
            page: page_index,
            y: self.cursor,
        };
        for name in line.anchors {
            self.anchors.entry(name).or_insert(at);
        }
        if let Some(page) = self.pages.last_mut() {
            let top = page.pdf_y(self.cursor);
            for item in &line.items {
                draw(&mut page.operations, item, top, &self.fonts, &self.images);
            }
            for LinkArea {
                x,
                y,
                width,
                height,
                target,
            } in line.links
            {
                let rect = [x, top - y - height, x + width, top - y];
                page.links.push((rect, target));
            }
        }
        self.cursor += line.height;
        at
    }

    fn assemble(&mut self) -> Result<Document, RenderError> {
        if self.pages.is_empty() {
            self.start_page();
        }
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut resources = dictionary! { "Font" => self.fonts.write(&mut doc) };
        if !self.images.is_empty() {
            resources.set("XObject", self.images.write(&mut doc));
        }
        let resources_id = doc.add_object(resources);

        let page_ids: Vec<ObjectId> = self.pages.iter().map(|_| doc.new_object_id()).collect();
        let geometry = self.pages_geometry();
        for (page, &page_id) in self.pages.iter_mut().zip(&page_ids) {
            let content = Content {
                operations: std::mem::take(&mut page.operations),
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

            let mut annotations = Vec::new();
            for (rect, target) in std::mem::take(&mut page.links) {
                let action = match target {
                    LinkTarget::Uri(uri) => dictionary! {
                        "Type" => "Action",
                        "S" => "URI",
                        "URI" => Object::string_literal(uri),
                    },
                    LinkTarget::Anchor(name) => {
                        let Some(dest) = destination(&self.anchors, &name, &page_ids, &geometry) else {
                            log::warn!("Link to unknown anchor '#{}' dropped", name);
                            continue;
                        };
                        dictionary! { "Type" => "Action", "S" => "GoTo", "D" => dest }
                    }
                };
                let rect: Vec<Object> = rect.iter().map(|v| (*v).into()).collect();
                annotations.push(Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Link",
                    "Rect" => rect,
                    "Border" => vec![0.into(), 0.into(), 0.into()],
                    "A" => action,
                })));
            }

            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.0.into(), 0.0.into(), page.width.into(), page.height.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            };
            if !annotations.is_empty() {
                page_dict.set("Annots", annotations);
            }
            doc.objects.insert(page_id, Object::Dictionary(page_dict));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => page_ids.len() as i64,
            }),
        );

        let entries: Vec<OutlineEntry> = self
            .outline
            .iter()
            .map(|(bookmark, at)| {
                let page = at.page.min(geometry.len() - 1);
                OutlineEntry {
                    title: bookmark.title.clone(),
                    level: bookmark.level,
                    page,
                    y: geometry[page].1 - at.y,
                }
            })
            .collect();
        let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => pages_id };
        if let Some(outline_id) = build_outline(&mut doc, &entries, &page_ids) {
            catalog.set("Outlines", outline_id);
            catalog.set("PageMode", "UseOutlines");
        }
        let catalog_id = doc.add_object(catalog);

        let mut info = dictionary! { "Producer" => Object::string_literal("sheaf") };
        if let Some(title) = &self.title {
            info.set("Title", text_string(title));
        }
        if let Some(date) = &self.creation_date {
            info.set(
                "CreationDate",
                Object::String(
                    format!("D:{}", date.format("%Y%m%d%H%M%SZ")).into_bytes(),
                    StringFormat::Literal,
                ),
            );
        }
        let info_id = doc.add_object(info);

        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        Ok(doc)
    }

    /// `(height, top of content area)` for every page, in PDF coordinates.
    fn pages_geometry(&self) -> Vec<(f32, f32)> {
        self.pages.iter().map(|p| (p.height, p.pdf_y(0.0))).collect()
    }
}

fn destination(
    anchors: &HashMap<String, InsertionPoint>,
    name: &str,
    page_ids: &[ObjectId],
    geometry: &[(f32, f32)],
) -> Option<Vec<Object>> {
    let at = anchors.get(name)?;
    let page_id = page_ids.get(at.page)?;
    let (_, top) = geometry.get(at.page)?;
    Some(vec![
        Object::Reference(*page_id),
        "XYZ".into(),
        Object::Null,
        (top - at.y).into(),
        Object::Null,
    ])
}

fn push_color(ops: &mut Vec<Operation>, op: &str, color: &Color) {
    let (r, g, b) = color.to_unit_rgb();
    ops.push(Operation::new(op, vec![r.into(), g.into(), b.into()]));
}

fn draw(ops: &mut Vec<Operation>, item: &Item, top: f32, fonts: &FontTable, images: &ImageTable) {
    match item {
        Item::Text {
            x,
            baseline,
            text,
            font,
            size,
            color,
        } => {
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(fonts.resource_name(*font).as_bytes().to_vec()), (*size).into()],
            ));
            push_color(ops, "rg", color);
            ops.push(Operation::new("Td", vec![(*x).into(), (top - baseline).into()]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }
        Item::Fill {
            x,
            y,
            width,
            height,
            color,
        } => {
            push_color(ops, "rg", color);
            ops.push(Operation::new(
                "re",
                vec![(*x).into(), (top - y - height).into(), (*width).into(), (*height).into()],
            ));
            ops.push(Operation::new("f", vec![]));
        }
        Item::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        } => {
            push_color(ops, "RG", color);
            ops.push(Operation::new("w", vec![(*width).into()]));
            ops.push(Operation::new("m", vec![(*x1).into(), (top - y1).into()]));
            ops.push(Operation::new("l", vec![(*x2).into(), (top - y2).into()]));
            ops.push(Operation::new("S", vec![]));
        }
        Item::Image {
            x,
            y,
            width,
            height,
            image,
        } => {
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new(
                "cm",
                vec![
                    (*width).into(),
                    0.into(),
                    0.into(),
                    (*height).into(),
                    (*x).into(),
                    (top - y - height).into(),
                ],
            ));
            ops.push(Operation::new(
                "Do",
                vec![Object::Name(images.resource_name(*image).as_bytes().to_vec())],
            ));
            ops.push(Operation::new("Q", vec![]));
        }
    }
}

impl<W: Write> DocumentWriter for PdfDocumentWriter<W> {
    fn begin_document(&mut self) -> Result<(), WriterError> {
        if self.state != State::Idle {
            return Err(WriterError::InvalidState("begin_document called twice"));
        }
        self.state = State::Open;
        Ok(())
    }

    fn emit_block(&mut self, node: &ContentNode) -> Result<InsertionPoint, WriterError> {
        self.ensure_open()?;
        if let ContentNode::PageBreak = node {
            self.page_break();
            return Ok(self.position());
        }

        let (x, width) = {
            let (page_width, _) = self.layout.size.dimensions_pt();
            match self.pages.last() {
                Some(page) if !self.break_pending => (page.margins.left, page.width - page.margins.horizontal()),
                _ => (self.layout.margins.left, page_width - self.layout.margins.horizontal()),
            }
        };
        let units = layout_block(
            node,
            x,
            width,
            &mut Resources {
                fonts: &mut self.fonts,
                images: &mut self.images,
            },
        );

        let mut start = None;
        for unit in units {
            match unit {
                Unit::Gap(height) => {
                    if !self.at_page_top() {
                        self.cursor += height;
                    }
                }
                Unit::PageBreak => self.page_break(),
                Unit::Content(line) => {
                    let at = self.place(line);
                    start.get_or_insert(at);
                }
            }
        }
        let start = start.unwrap_or_else(|| self.position());

        // Bookmarks registered for this block point at where it really
        // starts, which may be a later page than the position they were
        // registered at.
        for bookmark in self.pending_bookmarks.drain(..) {
            self.anchors.entry(bookmark.name.clone()).or_insert(start);
            self.outline.push((bookmark, start));
        }
        Ok(start)
    }

    fn position(&self) -> InsertionPoint {
        match self.pages.len() {
            0 => InsertionPoint::default(),
            n if self.break_pending => InsertionPoint { page: n, y: 0.0 },
            n => InsertionPoint {
                page: n - 1,
                y: self.cursor,
            },
        }
    }

    fn register_bookmark(&mut self, bookmark: &Bookmark, _at: InsertionPoint) -> Result<(), WriterError> {
        self.ensure_open()?;
        self.pending_bookmarks.push(bookmark.clone());
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), WriterError> {
        self.ensure_open()?;
        if self.break_pending {
            self.start_page();
        }
        let at = self.position();
        for bookmark in std::mem::take(&mut self.pending_bookmarks) {
            self.outline.push((bookmark, at));
        }
        let mut doc = self.assemble()?;
        doc.save_to(&mut self.out).map_err(RenderError::from)?;
        self.out.flush()?;
        self.state = State::Finished;
        log::info!(
            "Wrote PDF with {} pages, {} fonts and {} outline entries",
            self.pages.len(),
            self.fonts.len(),
            self.outline.len()
        );
        Ok(())
    }

    fn set_page_layout(&mut self, layout: &PageLayout) -> Result<(), WriterError> {
        self.layout = layout.clone();
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        if !title.is_empty() {
            self.title = Some(title.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_idf::{FontHandle, NodeMetadata, ParagraphKind, TextRun};
    use sheaf_style::{FontStyle, FontWeight, PageSize, TextDecoration};

    fn paragraph(text: &str) -> ContentNode {
        let mut node = ContentNode::paragraph(NodeMetadata::for_tag("p"), ParagraphKind::Flowing);
        node.append(ContentNode::TextRun(TextRun {
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
        }))
        .unwrap();
        node
    }

    fn heading(name: &str, level: u8) -> (ContentNode, Bookmark) {
        let bookmark = Bookmark {
            name: name.to_string(),
            title: name.to_string(),
            level,
        };
        let meta = NodeMetadata {
            bookmark: Some(bookmark.clone()),
            ..NodeMetadata::for_tag("h1")
        };
        let mut node = ContentNode::Heading {
            meta,
            level,
            children: Vec::new(),
        };
        if let ContentNode::Paragraph { children, .. } = paragraph(name) {
            if let Some(kids) = node.children_mut() {
                kids.extend(children);
            }
        }
        (node, bookmark)
    }

    fn write(blocks: &[(ContentNode, Option<Bookmark>)]) -> (Vec<u8>, usize) {
        let mut writer = PdfDocumentWriter::new(Vec::new()).with_creation_date(None);
        writer.begin_document().unwrap();
        for (node, bookmark) in blocks {
            if let Some(bookmark) = bookmark {
                let at = writer.position();
                writer.register_bookmark(bookmark, at).unwrap();
            }
            writer.emit_block(node).unwrap();
        }
        writer.set_title("Doc");
        writer.end_document().unwrap();
        let pages = writer.page_count();
        (writer.into_inner(), pages)
    }

    #[test]
    fn test_writes_loadable_pdf() {
        let (bytes, pages) = write(&[(paragraph("Hello PDF"), None)]);
        assert_eq!(pages, 1);
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("Hello"));
    }

    #[test]
    fn test_page_breaks_and_empty_page_breaks() {
        let (_, pages) = write(&[
            (ContentNode::PageBreak, None),
            (paragraph("one"), None),
            (ContentNode::PageBreak, None),
            (ContentNode::PageBreak, None),
            (paragraph("two"), None),
        ]);
        assert_eq!(pages, 2);
    }

    #[test]
    fn test_long_content_flows_onto_new_pages() {
        let text = "word ".repeat(3000);
        let (bytes, pages) = write(&[(paragraph(&text), None)]);
        assert!(pages > 1);
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), pages);
    }

    #[test]
    fn test_outline_has_entry_per_bookmark() {
        let (h1, b1) = heading("Intro", 1);
        let (h2, b2) = heading("Details", 2);
        let (h3, b3) = heading("End", 1);
        let (bytes, _) = write(&[(h1, Some(b1)), (h2, Some(b2)), (paragraph("x"), None), (h3, Some(b3))]);
        let doc = Document::load_mem(&bytes).unwrap();
        let catalog = doc.catalog().unwrap();
        let outlines = catalog.get(b"Outlines").unwrap().as_reference().unwrap();
        let root = doc.get_dictionary(outlines).unwrap();
        assert_eq!(root.get(b"Count").unwrap().as_i64().unwrap(), 3);
    }

    #[test]
    fn test_page_layout_applies_to_later_pages() {
        let mut writer = PdfDocumentWriter::new(Vec::new()).with_creation_date(None);
        writer.begin_document().unwrap();
        writer.emit_block(&paragraph("first")).unwrap();
        writer
            .set_page_layout(&PageLayout {
                size: PageSize::A5,
                margins: Margins::all(20.0),
            })
            .unwrap();
        writer.emit_block(&ContentNode::PageBreak).unwrap();
        let at = writer.emit_block(&paragraph("second")).unwrap();
        writer.end_document().unwrap();
        assert_eq!(at.page, 1);
        assert_eq!(writer.pages[0].width, PageSize::default().dimensions_pt().0);
        assert_eq!(writer.pages[1].width, PageSize::A5.dimensions_pt().0);
    }

    #[test]
    fn test_blocks_rejected_outside_document() {
        let mut writer = PdfDocumentWriter::new(Vec::new());
        assert!(matches!(
            writer.emit_block(&paragraph("x")),
            Err(WriterError::InvalidState(_))
        ));
        writer.begin_document().unwrap();
        writer.end_document().unwrap();
        assert!(writer.end_document().is_err());
    }

    #[test]
    fn test_internal_link_becomes_goto_annotation() {
        let mut target = paragraph("target");
        if let Some(meta) = target.meta_mut() {
            meta.id = Some("here".to_string());
        }
        let mut source = ContentNode::paragraph(NodeMetadata::for_tag("p"), ParagraphKind::Flowing);
        let ContentNode::Paragraph { children, .. } = paragraph("jump") else {
            unreachable!()
        };
        source
            .append(ContentNode::Link {
                href: Some("#here".to_string()),
                anchor: None,
                children,
            })
            .unwrap();
        let (bytes, _) = write(&[(source, None), (target, None)]);
        let doc = Document::load_mem(&bytes).unwrap();
        let has_goto = doc.objects.values().any(|object| {
            object
                .as_dict()
                .ok()
                .and_then(|d| d.get(b"A").ok())
                .and_then(|a| a.as_dict().ok())
                .and_then(|a| a.get(b"S").ok())
                .and_then(|s| s.as_name().ok())
                == Some(b"GoTo".as_slice())
        });
        assert!(has_goto);
    }
}
