use super::{HandlerCtx, TagHandler};
use sheaf_idf::ContentNode;
use sheaf_style::ListStyleType;

/// `ul` and `ol`. The marker comes from `list-style-type`.
#[derive(Debug, Default)]
pub struct ListHandler;

impl TagHandler for ListHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        let ordered = cx.tag == "ol";
        let start = cx
            .attribute("start")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        let marker = cx.style.list_style_type().unwrap_or(if ordered {
            ListStyleType::Decimal
        } else {
            ListStyleType::Disc
        });
        Some(ContentNode::List {
            meta: cx.metadata(),
            ordered,
            start,
            marker,
            children: Vec::new(),
        })
    }
}

#[derive(Debug, Default)]
pub struct ListItemHandler;

impl TagHandler for ListItemHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::list_item(cx.metadata()))
    }
}
