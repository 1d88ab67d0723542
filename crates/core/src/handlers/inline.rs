use super::{HandlerCtx, TagHandler};
use sheaf_idf::ContentNode;
use sheaf_style::Dimension;
use sheaf_types::Diagnostic;

/// `<img>`: the source is fetched through the resource provider. A failed load
/// keeps the node without data so the writer can fall back to the alt text.
#[derive(Debug, Default)]
pub struct ImageHandler;

fn points(dimension: Dimension) -> Option<f32> {
    match dimension {
        Dimension::Pt(value) if value > 0.0 => Some(value),
        _ => None,
    }
}

impl TagHandler for ImageHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        let Some(src) = cx.attribute("src").map(str::trim).filter(|s| !s.is_empty()) else {
            cx.report(Diagnostic::markup("<img> without a src attribute ignored"));
            return None;
        };
        let data = match cx.resources.load(src) {
            Ok(data) => Some(data),
            Err(err) => {
                cx.report(Diagnostic::resource(format!("Image '{}' unavailable: {}", src, err)));
                None
            }
        };
        Some(ContentNode::Image {
            src: src.to_string(),
            alt: cx.attribute("alt").map(str::to_string),
            data,
            width: points(cx.style.width()),
            height: points(cx.style.height()),
        })
    }
}

#[derive(Debug, Default)]
pub struct LineBreakHandler;

impl TagHandler for LineBreakHandler {
    fn open(&self, _cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::LineBreak)
    }
}

#[derive(Debug, Default)]
pub struct HorizontalRuleHandler;

impl TagHandler for HorizontalRuleHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        Some(ContentNode::HorizontalRule { meta: cx.metadata() })
    }
}

/// `<a>`: `href` for links, `name` or `id` for anchors.
#[derive(Debug, Default)]
pub struct LinkHandler;

impl TagHandler for LinkHandler {
    fn open(&self, cx: &mut HandlerCtx<'_>) -> Option<ContentNode> {
        let non_empty = |name: &str| cx.attribute(name).map(str::trim).filter(|v| !v.is_empty());
        Some(ContentNode::Link {
            href: non_empty("href").map(str::to_string),
            anchor: non_empty("name").or_else(|| non_empty("id")).map(str::to_string),
            children: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use sheaf_types::DiagnosticKind;

    #[test]
    fn test_image_loads_through_provider() {
        let mut harness = Harness::new(&[("src", "img/logo.png"), ("alt", "Logo")]);
        harness.resources.add("img/logo.png", vec![1, 2, 3]).unwrap();
        harness.style.set("width", "120pt");
        let mut cx = harness.cx("img");
        match ImageHandler.open(&mut cx) {
            Some(ContentNode::Image { src, alt, data, width, height }) => {
                assert_eq!(src, "img/logo.png");
                assert_eq!(alt.as_deref(), Some("Logo"));
                assert_eq!(data.map(|d| d.len()), Some(3));
                assert_eq!(width, Some(120.0));
                assert_eq!(height, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(cx.finish().diagnostics.is_empty());
    }

    #[test]
    fn test_missing_image_is_a_resource_diagnostic() {
        let harness = Harness::new(&[("src", "missing.png")]);
        let mut cx = harness.cx("img");
        let node = ImageHandler.open(&mut cx);
        assert!(matches!(node, Some(ContentNode::Image { data: None, .. })));
        let effects = cx.finish();
        assert_eq!(effects.diagnostics[0].kind, DiagnosticKind::Resource);

        let harness = Harness::new(&[]);
        let mut cx = harness.cx("img");
        assert!(ImageHandler.open(&mut cx).is_none());
        assert_eq!(cx.finish().diagnostics[0].kind, DiagnosticKind::Markup);
    }

    #[test]
    fn test_link_anchor_falls_back_to_id() {
        let harness = Harness::new(&[("href", " #top "), ("id", "ref")]);
        let mut cx = harness.cx("a");
        match LinkHandler.open(&mut cx) {
            Some(ContentNode::Link { href, anchor, .. }) => {
                assert_eq!(href.as_deref(), Some("#top"));
                assert_eq!(anchor.as_deref(), Some("ref"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
