//! Structural repair for children a container does not accept directly.
//!
//! A rejected child is wrapped in anonymous containers until the parent takes
//! it: inline content goes into a paragraph, a cell into a row, a row into a
//! table, anything in a list into a list item. When the parent's last child is
//! an anonymous wrapper of the kind that would be created, the child joins it
//! instead, so consecutive stray cells end up in one row.

use sheaf_idf::{ContentNode, NodeMetadata};
use sheaf_style::ListStyleType;

/// Wrapping never needs more levels than table > row > cell > paragraph.
const MAX_WRAP_DEPTH: usize = 4;

/// Places `child` into `parent`, repairing the structure if needed. Hands the
/// child back when no repair applies.
pub fn place(parent: &mut ContentNode, child: ContentNode) -> Result<(), ContentNode> {
    place_at(parent, child, 0)
}

fn place_at(parent: &mut ContentNode, child: ContentNode, depth: usize) -> Result<(), ContentNode> {
    if parent.accepts(&child) {
        return parent.append(child).map_err(|err| err.child);
    }
    if depth >= MAX_WRAP_DEPTH {
        return Err(child);
    }
    let Some(mut wrapper) = wrapper_for(parent, &child) else {
        return Err(child);
    };

    if let Some(last) = parent.children_mut().and_then(|c| c.last_mut())
        && last.meta().is_some_and(|m| m.anonymous)
        && last.kind() == wrapper.kind()
    {
        return place_at(last, child, depth + 1);
    }

    // Whitespace alone never opens a new wrapper.
    if matches!(&child, ContentNode::TextRun(run) if run.is_blank()) {
        return Ok(());
    }
    place_at(&mut wrapper, child, depth + 1)?;
    parent.append(wrapper).map_err(|err| err.child)
}

fn anonymous() -> NodeMetadata {
    NodeMetadata {
        anonymous: true,
        ..NodeMetadata::default()
    }
}

/// The anonymous container `parent` accepts that leads towards `child`.
fn wrapper_for(parent: &ContentNode, child: &ContentNode) -> Option<ContentNode> {
    match parent {
        ContentNode::Table { .. } => Some(ContentNode::row(anonymous())),
        ContentNode::Row { .. } => Some(ContentNode::cell(anonymous())),
        ContentNode::List { .. } => Some(ContentNode::list_item(anonymous())),
        ContentNode::Division { .. } | ContentNode::ListItem { .. } | ContentNode::Cell { .. } => {
            match child {
                c if c.is_inline() => Some(ContentNode::anonymous_paragraph()),
                ContentNode::Row { .. } | ContentNode::Cell { .. } => {
                    Some(ContentNode::table(anonymous()))
                }
                ContentNode::ListItem { .. } => Some(ContentNode::List {
                    meta: anonymous(),
                    ordered: false,
                    start: 1,
                    marker: ListStyleType::Disc,
                    children: Vec::new(),
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_idf::{FontHandle, ParagraphKind, TextRun};
    use sheaf_style::{FontStyle, FontWeight, TextDecoration};
    use sheaf_types::Color;

    fn text(s: &str) -> ContentNode {
        ContentNode::TextRun(TextRun {
            text: s.to_string(),
            font: FontHandle {
                family: "Helvetica".to_string(),
                postscript_name: "Helvetica".to_string(),
                weight: FontWeight::Regular,
                style: FontStyle::Normal,
                data: None,
            },
            size: 12.0,
            color: Color::BLACK,
            decoration: TextDecoration::None,
        })
    }

    fn kinds(node: &ContentNode) -> Vec<&'static str> {
        node.children().iter().map(ContentNode::kind).collect()
    }

    #[test]
    fn test_inline_in_division_shares_one_paragraph() {
        let mut div = ContentNode::division(NodeMetadata::default());
        place(&mut div, text("one ")).unwrap();
        place(&mut div, ContentNode::LineBreak).unwrap();
        place(&mut div, text("two")).unwrap();
        assert_eq!(kinds(&div), vec!["paragraph"]);
        assert_eq!(div.children()[0].children().len(), 3);
        assert!(matches!(
            &div.children()[0],
            ContentNode::Paragraph { kind: ParagraphKind::NoNewLine, meta, .. } if meta.anonymous
        ));
    }

    #[test]
    fn test_block_ends_anonymous_paragraph() {
        let mut div = ContentNode::division(NodeMetadata::default());
        place(&mut div, text("before")).unwrap();
        place(&mut div, ContentNode::paragraph(NodeMetadata::default(), ParagraphKind::Flowing)).unwrap();
        place(&mut div, text("after")).unwrap();
        assert_eq!(kinds(&div), vec!["paragraph", "paragraph", "paragraph"]);
    }

    #[test]
    fn test_cells_in_table_share_a_row() {
        let mut table = ContentNode::table(NodeMetadata::default());
        place(&mut table, ContentNode::cell(NodeMetadata::default())).unwrap();
        place(&mut table, ContentNode::cell(NodeMetadata::default())).unwrap();
        assert_eq!(kinds(&table), vec!["row"]);
        assert_eq!(kinds(&table.children()[0]), vec!["cell", "cell"]);
    }

    #[test]
    fn test_cell_in_division_gets_table_and_row() {
        let mut div = ContentNode::division(NodeMetadata::default());
        place(&mut div, ContentNode::cell(NodeMetadata::default())).unwrap();
        assert_eq!(kinds(&div), vec!["table"]);
        assert_eq!(kinds(&div.children()[0]), vec!["row"]);
    }

    #[test]
    fn test_text_in_list_gets_item_and_paragraph() {
        let mut list = ContentNode::List {
            meta: NodeMetadata::default(),
            ordered: true,
            start: 1,
            marker: ListStyleType::Decimal,
            children: Vec::new(),
        };
        place(&mut list, text("stray")).unwrap();
        assert_eq!(kinds(&list), vec!["list-item"]);
        assert_eq!(kinds(&list.children()[0]), vec!["paragraph"]);
    }

    #[test]
    fn test_blank_text_does_not_open_wrappers() {
        let mut table = ContentNode::table(NodeMetadata::default());
        place(&mut table, text("\n  ")).unwrap();
        assert!(table.children().is_empty());
    }

    #[test]
    fn test_block_in_paragraph_is_handed_back() {
        let mut paragraph = ContentNode::paragraph(NodeMetadata::default(), ParagraphKind::Flowing);
        let table = ContentNode::table(NodeMetadata::default());
        assert_eq!(place(&mut paragraph, table.clone()), Err(table));
    }
}
