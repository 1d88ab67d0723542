//! Block layout: turns one content node into a column of units.
//!
//! A unit is the smallest piece pagination moves as a whole: one line of a
//! paragraph, one table row, one rule. Coordinates inside a unit are in points
//! from the unit's top edge, y growing downwards; x is absolute on the page.

use crate::fonts::FontTable;
use crate::images::ImageTable;
use sheaf_idf::{BlockStyle, ContentNode, ParagraphKind, TextRun};
use sheaf_style::{ListStyleType, TextAlign, TextDecoration};
use sheaf_types::Color;

/// Indent of list item content from the list's left edge.
const LIST_INDENT: f32 = 24.0;
/// Gap between a list marker and the item content.
const MARKER_GAP: f32 = 6.0;
const CELL_PADDING: f32 = 3.0;
const RULE_HEIGHT: f32 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text {
        x: f32,
        baseline: f32,
        text: String,
        font: usize,
        size: f32,
        color: Color,
    },
    /// A filled rectangle.
    Fill {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    /// A straight line, used for rules, decorations and cell borders.
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Color,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Uri(String),
    /// A named position inside the document.
    Anchor(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub target: LinkTarget,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub height: f32,
    pub items: Vec<Item>,
    pub links: Vec<LinkArea>,
    /// Names that resolve to this unit's top edge.
    pub anchors: Vec<String>,
    /// Baseline of the first text line, used to align list markers.
    pub baseline: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    /// Vertical whitespace; dropped at the top of a page.
    Gap(f32),
    Content(Line),
    PageBreak,
}

/// Shared tables the layout registers fonts and images in.
pub struct Resources<'a> {
    pub fonts: &'a mut FontTable,
    pub images: &'a mut ImageTable,
}

/// Lays out `node` in the column starting at `x` with the given width.
pub fn layout_block(node: &ContentNode, x: f32, width: f32, res: &mut Resources<'_>) -> Vec<Unit> {
    let mut units = Vec::new();
    block(node, x, width.max(1.0), res, &mut units);
    units
}

fn block(node: &ContentNode, x: f32, width: f32, res: &mut Resources<'_>, out: &mut Vec<Unit>) {
    match node {
        ContentNode::PageBreak => out.push(Unit::PageBreak),
        ContentNode::Paragraph { meta, kind, children } => {
            boxed(&meta.style, meta.id.as_deref(), x, width, out, |x, width, out| {
                paragraph(children, *kind, &meta.style, x, width, res, out)
            })
        }
        ContentNode::Heading { meta, children, .. } => {
            boxed(&meta.style, meta.id.as_deref(), x, width, out, |x, width, out| {
                paragraph(children, ParagraphKind::Flowing, &meta.style, x, width, res, out)
            })
        }
        ContentNode::Division { meta, children }
        | ContentNode::ListItem { meta, children }
        | ContentNode::Cell { meta, children, .. }
        | ContentNode::Row { meta, children } => {
            boxed(&meta.style, meta.id.as_deref(), x, width, out, |x, width, out| {
                for child in children {
                    block(child, x, width, res, out);
                }
            })
        }
        ContentNode::List {
            meta,
            start,
            marker,
            children,
            ..
        } => boxed(&meta.style, meta.id.as_deref(), x, width, out, |x, width, out| {
            list(children, *start, marker, x, width, res, out)
        }),
        ContentNode::Table { meta, children } => {
            boxed(&meta.style, meta.id.as_deref(), x, width, out, |x, width, out| {
                table(children, x, width, res, out)
            })
        }
        ContentNode::HorizontalRule { meta } => {
            out.push(Unit::Gap(meta.style.margins.top));
            out.push(Unit::Content(Line {
                height: RULE_HEIGHT,
                items: vec![Item::Line {
                    x1: x,
                    y1: RULE_HEIGHT / 2.0,
                    x2: x + width,
                    y2: RULE_HEIGHT / 2.0,
                    width: 0.75,
                    color: Color::gray(128),
                }],
                anchors: meta.id.iter().cloned().collect(),
                ..Line::default()
            }));
            out.push(Unit::Gap(meta.style.margins.bottom));
        }
        inline => paragraph(
            std::slice::from_ref(inline),
            ParagraphKind::NoNewLine,
            &BlockStyle::default(),
            x,
            width,
            res,
            out,
        ),
    }
}

/// Applies margins, padding, background and the id anchor around `inner`.
fn boxed(
    style: &BlockStyle,
    id: Option<&str>,
    x: f32,
    width: f32,
    out: &mut Vec<Unit>,
    inner: impl FnOnce(f32, f32, &mut Vec<Unit>),
) {
    out.push(Unit::Gap(style.margins.top));
    let first = out.len();
    if style.padding.top > 0.0 {
        out.push(Unit::Content(Line {
            height: style.padding.top,
            ..Line::default()
        }));
    }
    let inner_x = x + style.margins.left + style.padding.left;
    let inner_width = (width - style.margins.horizontal() - style.padding.horizontal()).max(1.0);
    inner(inner_x, inner_width, out);
    if style.padding.bottom > 0.0 {
        out.push(Unit::Content(Line {
            height: style.padding.bottom,
            ..Line::default()
        }));
    }

    if let Some(id) = id {
        match out[first..].iter_mut().find_map(|u| match u {
            Unit::Content(line) => Some(line),
            _ => None,
        }) {
            Some(line) => line.anchors.push(id.to_string()),
            None => out.push(Unit::Content(Line {
                anchors: vec![id.to_string()],
                ..Line::default()
            })),
        }
    }
    if let Some(color) = &style.background {
        let band_x = x + style.margins.left;
        let band_width = width - style.margins.horizontal();
        for unit in &mut out[first..] {
            if let Unit::Content(line) = unit {
                line.items.insert(
                    0,
                    Item::Fill {
                        x: band_x,
                        y: 0.0,
                        width: band_width,
                        height: line.height,
                        color: color.clone(),
                    },
                );
            }
        }
    }
    out.push(Unit::Gap(style.margins.bottom));
}

// --- Inline formatting ---

#[derive(Debug, Clone)]
enum Piece {
    Word {
        text: String,
        font: usize,
        size: f32,
        color: Color,
        decoration: TextDecoration,
        width: f32,
        space_before: f32,
        link: Option<usize>,
    },
    Image {
        image: usize,
        width: f32,
        height: f32,
        space_before: f32,
        link: Option<usize>,
    },
    Break,
}

impl Piece {
    fn width(&self) -> f32 {
        match self {
            Piece::Word { width, .. } | Piece::Image { width, .. } => *width,
            Piece::Break => 0.0,
        }
    }

    fn space_before(&self) -> f32 {
        match self {
            Piece::Word { space_before, .. } | Piece::Image { space_before, .. } => *space_before,
            Piece::Break => 0.0,
        }
    }

    /// Height above and below the baseline.
    fn extent(&self) -> (f32, f32) {
        match self {
            Piece::Word { size, .. } => (size * 0.9, size * 0.3),
            Piece::Image { height, .. } => (*height, 0.0),
            Piece::Break => (0.0, 0.0),
        }
    }
}

struct Pieces<'r, 'a> {
    res: &'r mut Resources<'a>,
    pieces: Vec<Piece>,
    links: Vec<LinkTarget>,
    anchors: Vec<(usize, String)>,
    pending_space: bool,
    max_width: f32,
    kind: ParagraphKind,
}

impl Pieces<'_, '_> {
    fn collect(&mut self, node: &ContentNode, link: Option<usize>) {
        match node {
            ContentNode::TextRun(run) => self.run(run, link),
            ContentNode::LineBreak => {
                self.pieces.push(Piece::Break);
                self.pending_space = false;
            }
            ContentNode::Image {
                src,
                alt,
                data,
                width,
                height,
            } => self.image(src, alt.as_deref(), data.as_ref(), *width, *height, link),
            ContentNode::Link {
                href,
                anchor,
                children,
            } => {
                if let Some(name) = anchor {
                    self.anchors.push((self.pieces.len(), name.clone()));
                }
                let target = href.as_deref().map(str::trim).filter(|h| !h.is_empty()).map(|href| {
                    match href.strip_prefix('#') {
                        Some(name) => LinkTarget::Anchor(name.to_string()),
                        None => LinkTarget::Uri(href.to_string()),
                    }
                });
                let link = match target {
                    Some(target) => {
                        self.links.push(target);
                        Some(self.links.len() - 1)
                    }
                    None => link,
                };
                for child in children {
                    self.collect(child, link);
                }
            }
            _ => log::debug!("Skipping {} inside a line", node.kind()),
        }
    }

    fn run(&mut self, run: &TextRun, link: Option<usize>) {
        let font = self.res.fonts.register(&run.font);
        let space = self.res.fonts.measure(font, " ", run.size);
        let mut words = run.text.split_whitespace().peekable();
        let mut leading = self.pending_space || run.text.starts_with(char::is_whitespace);
        if words.peek().is_none() {
            self.pending_space = leading || !run.text.is_empty();
            return;
        }
        for word in words {
            self.pieces.push(Piece::Word {
                text: word.to_string(),
                font,
                size: run.size,
                color: run.color.clone(),
                decoration: run.decoration.clone(),
                width: self.res.fonts.measure(font, word, run.size),
                space_before: if leading { space } else { 0.0 },
                link,
            });
            leading = true;
        }
        self.pending_space = run.text.ends_with(char::is_whitespace);
    }

    fn image(
        &mut self,
        src: &str,
        alt: Option<&str>,
        data: Option<&sheaf_idf::SharedData>,
        width: Option<f32>,
        height: Option<f32>,
        link: Option<usize>,
    ) {
        let registered = data.and_then(|data| self.res.images.register(src, data));
        let Some(image) = registered else {
            if let Some(alt) = alt.filter(|a| !a.trim().is_empty()) {
                let font = self.res.fonts.register(&fallback_font());
                self.pieces.push(Piece::Word {
                    text: format!("[{}]", alt.trim()),
                    font,
                    size: 10.0,
                    color: Color::gray(96),
                    decoration: TextDecoration::None,
                    width: self.res.fonts.measure(font, &format!("[{}]", alt.trim()), 10.0),
                    space_before: 0.0,
                    link,
                });
            }
            return;
        };
        let (px_w, px_h) = self.res.images.pixel_size(image);
        let (natural_w, natural_h) = (px_w as f32 * 0.75, px_h as f32 * 0.75);
        let (mut w, mut h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * natural_h / natural_w.max(1.0)),
            (None, Some(h)) => (h * natural_w / natural_h.max(1.0), h),
            (None, None) => (natural_w, natural_h),
        };
        if w > self.max_width {
            h *= self.max_width / w;
            w = self.max_width;
        }
        let follows_text = matches!(self.pieces.last(), Some(Piece::Word { .. }));
        if follows_text && self.kind == ParagraphKind::Flowing {
            self.pieces.push(Piece::Break);
        }
        let space_before = if self.pending_space { 3.0 } else { 0.0 };
        self.pieces.push(Piece::Image {
            image,
            width: w,
            height: h,
            space_before,
            link,
        });
        self.pending_space = false;
    }
}

fn fallback_font() -> sheaf_idf::FontHandle {
    sheaf_idf::FontHandle {
        family: "Helvetica".to_string(),
        postscript_name: "Helvetica-Oblique".to_string(),
        weight: sheaf_style::FontWeight::Regular,
        style: sheaf_style::FontStyle::Italic,
        data: None,
    }
}

fn paragraph(
    children: &[ContentNode],
    kind: ParagraphKind,
    style: &BlockStyle,
    x: f32,
    width: f32,
    res: &mut Resources<'_>,
    out: &mut Vec<Unit>,
) {
    let mut collector = Pieces {
        res,
        pieces: Vec::new(),
        links: Vec::new(),
        anchors: Vec::new(),
        pending_space: false,
        max_width: width,
        kind,
    };
    for child in children {
        collector.collect(child, None);
    }
    // The content model already separates text from a following image in
    // flowing paragraphs; do not break twice.
    collector.pieces.dedup_by(|b, a| matches!((a, b), (Piece::Break, Piece::Break)));
    let Pieces {
        pieces, links, anchors, ..
    } = collector;

    let mut start = 0;
    let mut anchors = anchors.into_iter().peekable();
    for range in break_lines(&pieces, width) {
        let mut line = build_line(&pieces[range.clone()], &links, style, x, width);
        while let Some((_, name)) = anchors.next_if(|(at, _)| *at < range.end.max(start + 1)) {
            line.anchors.push(name);
        }
        start = range.end;
        out.push(Unit::Content(line));
    }
    for (_, name) in anchors {
        out.push(Unit::Content(Line {
            anchors: vec![name],
            ..Line::default()
        }));
    }
}

/// Greedy line breaking. A `Break` piece ends its line; an empty line
/// between two breaks still takes up height.
fn break_lines(pieces: &[Piece], width: f32) -> Vec<std::ops::Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut used = 0.0f32;
    for (index, piece) in pieces.iter().enumerate() {
        if let Piece::Break = piece {
            lines.push(start..index + 1);
            start = index + 1;
            used = 0.0;
            continue;
        }
        let advance = if index == start {
            piece.width()
        } else {
            piece.space_before() + piece.width()
        };
        if index > start && used + advance > width {
            lines.push(start..index);
            start = index;
            used = piece.width();
        } else {
            used += advance;
        }
    }
    if start < pieces.len() {
        lines.push(start..pieces.len());
    }
    lines
}

fn build_line(pieces: &[Piece], links: &[LinkTarget], style: &BlockStyle, x: f32, width: f32) -> Line {
    let (mut ascent, mut descent) = (0.0f32, 0.0f32);
    for piece in pieces {
        let (a, d) = piece.extent();
        ascent = ascent.max(a);
        descent = descent.max(d);
    }
    if ascent == 0.0 {
        // An empty line from consecutive breaks.
        ascent = 10.8;
        descent = 3.6;
    }
    let natural = ascent + descent;
    let height = if style.line_height > 0.0 {
        style.line_height
    } else {
        natural
    };
    let baseline = (height - natural) / 2.0 + ascent;

    let content_width: f32 = pieces
        .iter()
        .enumerate()
        .map(|(i, p)| if i == 0 { p.width() } else { p.space_before() + p.width() })
        .sum();
    let offset = match style.text_align {
        TextAlign::Right => (width - content_width).max(0.0),
        TextAlign::Center => ((width - content_width) / 2.0).max(0.0),
        TextAlign::Left | TextAlign::Justify => 0.0,
    };

    let mut line = Line {
        height,
        baseline: Some(baseline),
        ..Line::default()
    };
    let mut cursor = x + offset;
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            cursor += piece.space_before();
        }
        match piece {
            Piece::Word {
                text,
                font,
                size,
                color,
                decoration,
                width,
                link,
                ..
            } => {
                line.items.push(Item::Text {
                    x: cursor,
                    baseline,
                    text: text.clone(),
                    font: *font,
                    size: *size,
                    color: color.clone(),
                });
                let decoration_y = match decoration {
                    TextDecoration::Underline => Some(baseline + size * 0.12),
                    TextDecoration::LineThrough => Some(baseline - size * 0.3),
                    TextDecoration::None => None,
                };
                if let Some(y) = decoration_y {
                    line.items.push(Item::Line {
                        x1: cursor,
                        y1: y,
                        x2: cursor + width,
                        y2: y,
                        width: (size / 18.0).max(0.5),
                        color: color.clone(),
                    });
                }
                if let Some(target) = link.and_then(|l| links.get(l)) {
                    line.links.push(LinkArea {
                        x: cursor,
                        y: baseline - size * 0.9,
                        width: *width,
                        height: size * 1.2,
                        target: target.clone(),
                    });
                }
            }
            Piece::Image {
                image,
                width,
                height,
                link,
                ..
            } => {
                line.items.push(Item::Image {
                    x: cursor,
                    y: baseline - height,
                    width: *width,
                    height: *height,
                    image: *image,
                });
                if let Some(target) = link.and_then(|l| links.get(l)) {
                    line.links.push(LinkArea {
                        x: cursor,
                        y: baseline - height,
                        width: *width,
                        height: *height,
                        target: target.clone(),
                    });
                }
            }
            Piece::Break => {}
        }
        cursor += piece.width();
    }
    line
}

// --- Lists ---

fn list(
    items: &[ContentNode],
    start: usize,
    marker: &ListStyleType,
    x: f32,
    width: f32,
    res: &mut Resources<'_>,
    out: &mut Vec<Unit>,
) {
    let marker_font = res.fonts.register(&marker_handle());
    let content_x = x + LIST_INDENT;
    let content_width = (width - LIST_INDENT).max(1.0);
    let mut number = start;
    for item in items {
        let mut units = Vec::new();
        block(item, content_x, content_width, res, &mut units);
        if matches!(item, ContentNode::ListItem { .. }) {
            let label = marker.marker(number);
            number += 1;
            if !label.is_empty() {
                let label_width = res.fonts.measure(marker_font, &label, 12.0);
                let text = Item::Text {
                    x: content_x - MARKER_GAP - label_width,
                    baseline: 0.0,
                    text: label,
                    font: marker_font,
                    size: 12.0,
                    color: Color::BLACK,
                };
                attach_marker(&mut units, text);
            }
        }
        out.extend(units);
    }
}

/// Puts the marker on the item's first line, or on a line of its own when the
/// item has no text.
fn attach_marker(units: &mut Vec<Unit>, mut marker: Item) {
    let first_line = units.iter_mut().find_map(|u| match u {
        Unit::Content(line) if line.baseline.is_some() => Some(line),
        _ => None,
    });
    match first_line {
        Some(line) => {
            if let Item::Text { baseline, .. } = &mut marker {
                *baseline = line.baseline.unwrap_or(10.8);
            }
            line.items.push(marker);
        }
        None => {
            if let Item::Text { baseline, .. } = &mut marker {
                *baseline = 10.8;
            }
            units.push(Unit::Content(Line {
                height: 14.4,
                items: vec![marker],
                baseline: Some(10.8),
                ..Line::default()
            }));
        }
    }
}

fn marker_handle() -> sheaf_idf::FontHandle {
    sheaf_idf::FontHandle {
        postscript_name: "Helvetica".to_string(),
        ..fallback_font()
    }
}

// --- Tables ---

fn table(rows: &[ContentNode], x: f32, width: f32, res: &mut Resources<'_>, out: &mut Vec<Unit>) {
    let columns = rows
        .iter()
        .map(|row| row.children().iter().map(col_span).sum::<usize>())
        .max()
        .unwrap_or(0)
        .max(1);
    let column_width = width / columns as f32;
    // Columns still covered by a cell from a row above, in rows remaining.
    let mut covered = vec![0usize; columns];

    for row in rows {
        let mut cells = Vec::new();
        let mut column = 0;
        for cell in row.children() {
            while column < columns && covered[column] > 0 {
                column += 1;
            }
            if column >= columns {
                log::debug!("Dropping table cell beyond {} columns", columns);
                break;
            }
            let span = col_span(cell).min(columns - column);
            let cell_x = x + column as f32 * column_width;
            let cell_width = span as f32 * column_width;
            let mut units = Vec::new();
            block(
                cell,
                cell_x + CELL_PADDING,
                (cell_width - 2.0 * CELL_PADDING).max(1.0),
                res,
                &mut units,
            );
            let row_span = match cell {
                ContentNode::Cell { row_span, .. } => (*row_span).max(1),
                _ => 1,
            };
            covered[column..column + span].fill(row_span);
            cells.push((cell_x, cell_width, flatten(units)));
            column += span;
        }
        for slot in covered.iter_mut() {
            *slot = slot.saturating_sub(1);
        }

        let height = cells
            .iter()
            .map(|(_, _, line)| line.height + 2.0 * CELL_PADDING)
            .fold(0.0f32, f32::max);
        let mut line = Line {
            height,
            ..Line::default()
        };
        for (cell_x, cell_width, cell) in cells {
            line.items.extend(shift_items(cell.items, CELL_PADDING));
            line.links.extend(cell.links.into_iter().map(|mut l| {
                l.y += CELL_PADDING;
                l
            }));
            line.anchors.extend(cell.anchors);
            line.items.extend(cell_border(cell_x, cell_width, height));
        }
        out.push(Unit::Content(line));
    }
}

fn col_span(cell: &ContentNode) -> usize {
    match cell {
        ContentNode::Cell { col_span, .. } => (*col_span).max(1),
        _ => 1,
    }
}

fn cell_border(x: f32, width: f32, height: f32) -> Vec<Item> {
    let color = Color::gray(160);
    let edge = |x1, y1, x2, y2| Item::Line {
        x1,
        y1,
        x2,
        y2,
        width: 0.5,
        color: color.clone(),
    };
    vec![
        edge(x, 0.0, x + width, 0.0),
        edge(x, height, x + width, height),
        edge(x, 0.0, x, height),
        edge(x + width, 0.0, x + width, height),
    ]
}

/// Stacks a column of units into one, dropping page breaks.
pub fn flatten(units: Vec<Unit>) -> Line {
    let mut merged = Line::default();
    for unit in units {
        match unit {
            Unit::Gap(h) => merged.height += h,
            Unit::PageBreak => {}
            Unit::Content(line) => {
                let top = merged.height;
                if merged.baseline.is_none() {
                    merged.baseline = line.baseline.map(|b| b + top);
                }
                merged.items.extend(shift_items(line.items, top));
                merged.links.extend(line.links.into_iter().map(|mut l| {
                    l.y += top;
                    l
                }));
                merged.anchors.extend(line.anchors);
                merged.height += line.height;
            }
        }
    }
    merged
}

fn shift_items(items: Vec<Item>, dy: f32) -> impl Iterator<Item = Item> {
    items.into_iter().map(move |item| match item {
        Item::Text {
            x,
            baseline,
            text,
            font,
            size,
            color,
        } => Item::Text {
            x,
            baseline: baseline + dy,
            text,
            font,
            size,
            color,
        },
        Item::Fill {
            x,
            y,
            width,
            height,
            color,
        } => Item::Fill {
            x,
            y: y + dy,
            width,
            height,
            color,
        },
        Item::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        } => Item::Line {
            x1,
            y1: y1 + dy,
            x2,
            y2: y2 + dy,
            width,
            color,
        },
        Item::Image {
            x,
            y,
            width,
            height,
            image,
        } => Item::Image {
            x,
            y: y + dy,
            width,
            height,
            image,
        },
    })
}
