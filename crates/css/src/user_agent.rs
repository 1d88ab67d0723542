//! Built-in defaults for HTML elements, applied below every author rule.

use crate::stylesheet::{parse_stylesheet, Stylesheet};

const USER_AGENT_CSS: &str = r#"
html, body, div, p, blockquote, address, pre, h1, h2, h3, h4, h5, h6, ul, ol, dl, dt, dd,
section, article, header, footer, nav, main, aside, figure, figcaption, form, center, hr {
    display: block
}
li { display: list-item }
table { display: table }
tr { display: table-row }
td, th { display: table-cell }
head, script, style, title, meta, link { display: none }

b, strong, th, dt { font-weight: bold }
i, em, cite, var, dfn, address { font-style: italic }
pre, code, tt, kbd, samp, listing { font-family: Courier, monospace }
u, ins, a { text-decoration: underline }
s, strike, del { text-decoration: line-through }
center, th, caption { text-align: center }
small, sub, sup { font-size: smaller }
big { font-size: larger }

h1 { font-size: 2em; font-weight: bold; margin: 0.67em 0 }
h2 { font-size: 1.5em; font-weight: bold; margin: 0.83em 0 }
h3 { font-size: 1.17em; font-weight: bold; margin: 1em 0 }
h4 { font-size: 1em; font-weight: bold; margin: 1.33em 0 }
h5 { font-size: 0.83em; font-weight: bold; margin: 1.67em 0 }
h6 { font-size: 0.67em; font-weight: bold; margin: 2.33em 0 }

p, pre, dl, ul, ol, blockquote { margin-top: 1em; margin-bottom: 1em }
ul ul, ol ol, ul ol, ol ul { margin-top: 0; margin-bottom: 0 }
blockquote { margin-left: 30pt; margin-right: 30pt }
ul, ol { padding-left: 30pt }
dd { margin-left: 30pt }
hr { margin: 0.5em 0 }

ul { list-style-type: disc }
ol { list-style-type: decimal }
ul ul { list-style-type: circle }
ul ul ul { list-style-type: square }
"#;

/// Parses the built-in stylesheet. Callers build it once and share it.
pub fn user_agent_stylesheet() -> Stylesheet {
    let (sheet, diagnostics) = parse_stylesheet(USER_AGENT_CSS);
    for diagnostic in &diagnostics {
        log::error!("Built-in stylesheet: {}", diagnostic);
    }
    sheet
}
