use super::{HandlerCtx, TagHandler};
use sheaf_idf::ContentNode;

/// Upper bound on `colspan` and `rowspan`.
const MAX_SPAN: usize = 1000;

#[derive(Debug, Default)]
pub struct TableHandler;

impl TagHandler for TableHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::table(cx.metadata()))
    }

    fn close(&self, node: ContentNode, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        if node.children().is_empty() {
            log::debug!("Dropping <{}> without rows", cx.tag);
            return None;
        }
        Some(node)
    }
}

#[derive(Debug, Default)]
pub struct RowHandler;

impl TagHandler for RowHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::row(cx.metadata()))
    }
}

/// `td` and `th`.
#[derive(Debug, Default)]
pub struct CellHandler;

fn span(cx: &HandlerCtx<'_>, name: &str) -> usize {
    cx.attribute(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_SPAN))
        .unwrap_or(1)
}

impl TagHandler for CellHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::Cell {
            meta: cx.metadata(),
            header: cx.tag == "th",
            col_span: span(cx, "colspan"),
            row_span: span(cx, "rowspan"),
            children: Vec::new(),
        })
    }
}
