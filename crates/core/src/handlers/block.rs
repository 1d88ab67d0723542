use super::{HandlerCtx, TagHandler, TextFlow};
use sheaf_idf::{Bookmark, ContentNode, ParagraphKind, TextRun};

/// Skips the element itself; its content flows into the enclosing node.
#[derive(Debug, Default)]
pub struct TransparentHandler;

impl TagHandler for TransparentHandler {
    fn open(&self, _cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        None
    }
}

/// Produces nothing and swallows any text inside.
#[derive(Debug, Default)]
pub struct IgnoreHandler;

impl TagHandler for IgnoreHandler {
    fn open(&self, _cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        None
    }

    fn append_text(
        &self,
        _node: Option<&mut ContentNode>,
        _run: TextRun,
        _cx: &mut HandlerCtx<'_>,
    ) -> TextFlow {
        TextFlow::Consumed
    }
}

/// Swallows its text into the document title.
#[derive(Debug, Default)]
pub struct TitleHandler;

impl TagHandler for TitleHandler {
    fn open(&self, _cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        None
    }

    fn append_text(
        &self,
        _node: Option<&mut ContentNode>,
        run: TextRun,
        cx: &mut HandlerCtx<'_>,
    ) -> TextFlow {
        cx.append_title(&run.text);
        TextFlow::Consumed
    }
}

#[derive(Debug, Default)]
pub struct ParagraphHandler;

impl TagHandler for ParagraphHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::paragraph(cx.metadata(), ParagraphKind::Flowing))
    }

    fn close(&self, node: ContentNode, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        let has_id = node.meta().is_some_and(|m| m.id.is_some());
        if node.is_empty_block() && !has_id {
            log::debug!("Dropping empty <{}>", cx.tag);
            return None;
        }
        Some(node)
    }
}

/// A paragraph whose line breaks are kept.
#[derive(Debug, Default)]
pub struct PreformattedHandler;

impl TagHandler for PreformattedHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::paragraph(cx.metadata(), ParagraphKind::NoNewLine))
    }

    fn append_text(
        &self,
        node: Option<&mut ContentNode>,
        run: TextRun,
        _cx: &mut HandlerCtx<'_>,
    ) -> TextFlow {
        let Some(node) = node else {
            return TextFlow::Pass(run);
        };
        let text = run.text.replace("\r\n", "\n").replace('\r', "\n");
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 && node.append(ContentNode::LineBreak).is_err() {
                break;
            }
            if line.is_empty() {
                continue;
            }
            let piece = TextRun {
                text: line.to_string(),
                ..run.clone()
            };
            if let Err(err) = node.append(ContentNode::TextRun(piece)) {
                log::warn!("Preformatted text lost: {}", err);
            }
        }
        TextFlow::Consumed
    }
}

#[derive(Debug, Default)]
pub struct DivisionHandler;

impl TagHandler for DivisionHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::division(cx.metadata()))
    }
}

/// `h1`..`h6`. Allocates an outline destination when auto-bookmarking is on.
#[derive(Debug, Default)]
pub struct HeadingHandler;

impl TagHandler for HeadingHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        let level = cx
            .tag
            .strip_prefix('h')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=6).contains(n))
            .unwrap_or(1);
        let mut meta = cx.metadata();
        if cx.config.auto_bookmark {
            let number = cx.next_bookmark();
            meta.bookmark = Some(Bookmark {
                name: format!("{}-{}", number, cx.tag),
                title: String::new(),
                level,
            });
        }
        Some(ContentNode::Heading {
            meta,
            level,
            children: Vec::new(),
        })
    }

    fn close(&self, mut node: ContentNode, _cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        let text = node.text_content();
        if let Some(bookmark) = node.meta_mut().and_then(|m| m.bookmark.as_mut()) {
            bookmark.title = if text.is_empty() {
                bookmark.name.clone()
            } else {
                text
            };
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use sheaf_idf::FontHandle;
    use sheaf_style::{FontStyle, FontWeight, TextDecoration};
    use sheaf_types::Color;

    fn run(text: &str) -> TextRun {
        TextRun {
            text: text.to_string(),
            font: FontHandle {
                family: "Courier".to_string(),
                postscript_name: "Courier".to_string(),
                weight: FontWeight::Regular,
                style: FontStyle::Normal,
                data: None,
            },
            size: 10.0,
            color: Color::BLACK,
            decoration: TextDecoration::None,
        }
    }

    #[test]
    fn test_heading_bookmark_named_from_counter() {
        let harness = Harness::new(&[]);
        let mut cx = harness.cx("h2");
        let mut node = HeadingHandler.open(&mut cx).unwrap();
        node.append(ContentNode::TextRun(run("  Getting\n started "))).unwrap();
        let node = HeadingHandler.close(node, &mut cx).unwrap();

        let bookmark = node.meta().and_then(|m| m.bookmark.clone()).unwrap();
        assert_eq!(bookmark.name, "1-h2");
        assert_eq!(bookmark.title, "Getting started");
        assert_eq!(bookmark.level, 2);
        assert_eq!(cx.finish().counters.bookmarks, 1);
    }

    #[test]
    fn test_heading_without_auto_bookmark() {
        let mut harness = Harness::new(&[]);
        harness.config.auto_bookmark = false;
        let mut cx = harness.cx("h1");
        let node = HeadingHandler.open(&mut cx).unwrap();
        assert!(node.bookmarks().is_empty());
        assert_eq!(cx.finish().counters.bookmarks, 0);
    }

    #[test]
    fn test_preformatted_keeps_line_breaks() {
        let harness = Harness::new(&[]);
        let mut cx = harness.cx("pre");
        let mut node = PreformattedHandler.open(&mut cx).unwrap();
        let flow = PreformattedHandler.append_text(Some(&mut node), run("a  b\n\nc"), &mut cx);
        assert_eq!(flow, TextFlow::Consumed);

        let kinds: Vec<&str> = node.children().iter().map(ContentNode::kind).collect();
        assert_eq!(kinds, vec!["text-run", "line-break", "line-break", "text-run"]);
        match &node.children()[0] {
            ContentNode::TextRun(first) => assert_eq!(first.text, "a  b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_title_and_ignore_swallow_text() {
        let harness = Harness::new(&[]);
        let mut cx = harness.cx("title");
        assert_eq!(TitleHandler.append_text(None, run("Report"), &mut cx), TextFlow::Consumed);
        assert_eq!(cx.finish().title, "Report");

        let mut cx = harness.cx("script");
        assert_eq!(IgnoreHandler.append_text(None, run("x()"), &mut cx), TextFlow::Consumed);
        assert!(IgnoreHandler.open(&mut cx).is_none());
    }

    #[test]
    fn test_empty_paragraph_dropped() {
        let harness = Harness::new(&[]);
        let mut cx = harness.cx("p");
        let mut node = ParagraphHandler.open(&mut cx).unwrap();
        node.append(ContentNode::TextRun(run("  "))).unwrap();
        assert!(ParagraphHandler.close(node, &mut cx).is_none());

        let anchored = Harness::new(&[("id", "top")]);
        let mut cx = anchored.cx("p");
        let node = ParagraphHandler.open(&mut cx).unwrap();
        assert!(ParagraphHandler.close(node, &mut cx).is_some());
    }
}
