//! Builds a balanced event stream from tokens.
//!
//! The open-element stack is the only state. End tags close back to the most
//! recent matching open element, closing anything opened after it first; end
//! tags with no open match are dropped. A handful of start tags imply the end
//! of an open sibling (`li`, `dt`/`dd`, `tr`, `td`/`th`, table sections) or of
//! an open paragraph (block-level starts).

use crate::charset;
use crate::entities::{UnknownEntityMode, decode_entities};
use crate::error::MarkupError;
use crate::event::{Attributes, Event};
use crate::newline::{NewLineMode, NewLinePolicy};
use crate::tokenizer::{Token, tokenize};
use serde::{Deserialize, Serialize};
use sheaf_types::Diagnostic;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text keeps its whitespace as written.
const PRESERVE_WHITESPACE: &[&str] = &["listing", "pre", "textarea"];

const PHRASING: &[&str] = &[
    "a", "abbr", "b", "big", "cite", "code", "em", "font", "i", "kbd", "label", "q", "s", "samp",
    "small", "span", "strike", "strong", "sub", "sup", "tt", "u", "var",
];

const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Tag name used for the boundaries of the document itself.
const DOCUMENT_TAG: &str = "html";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkupConfig {
    pub new_line: NewLineMode,
    pub unknown_entity: UnknownEntityMode,
    /// Forces the input encoding regardless of what the input declares.
    pub charset_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub events: Vec<Event>,
    pub diagnostics: Vec<Diagnostic>,
    /// Name of the encoding the input was decoded with.
    pub encoding: String,
}

#[derive(Debug)]
pub struct MarkupParser {
    config: MarkupConfig,
    policy: Box<dyn NewLinePolicy>,
}

impl MarkupParser {
    pub fn new(config: MarkupConfig) -> Self {
        let policy = config.new_line.policy();
        Self { config, policy }
    }

    /// Uses a caller-supplied policy instead of the one named in the config.
    pub fn with_policy(config: MarkupConfig, policy: Box<dyn NewLinePolicy>) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &MarkupConfig {
        &self.config
    }

    /// Decodes `bytes` and parses them from the start. `charset` is the label
    /// the caller knows the input to be in, if any.
    pub fn parse(&self, bytes: &[u8], charset: Option<&str>) -> Result<ParseOutput, MarkupError> {
        let decoded = charset::decode(bytes, self.config.charset_override.as_deref(), charset)?;
        let mut output = self.parse_str(&decoded.text);
        if let Some(label) = decoded.ignored_meta_label {
            output.diagnostics.insert(
                0,
                Diagnostic::markup(format!("unknown charset '{}' in <meta> ignored; using UTF-8", label)),
            );
        }
        output.encoding = decoded.encoding.name().to_string();
        Ok(output)
    }

    /// Parses text that is already decoded.
    pub fn parse_str(&self, text: &str) -> ParseOutput {
        let (tokens, diagnostics) = tokenize(text);
        let mut builder = TreeBuilder {
            policy: self.policy.as_ref(),
            unknown_entity: self.config.unknown_entity,
            stack: Vec::new(),
            events: Vec::with_capacity(tokens.len() + 2),
            diagnostics,
        };
        builder.run(&tokens);
        ParseOutput {
            events: builder.events,
            diagnostics: builder.diagnostics,
            encoding: encoding_rs::UTF_8.name().to_string(),
        }
    }
}

struct TreeBuilder<'p> {
    policy: &'p dyn NewLinePolicy,
    unknown_entity: UnknownEntityMode,
    stack: Vec<String>,
    events: Vec<Event>,
    diagnostics: Vec<Diagnostic>,
}

impl TreeBuilder<'_> {
    fn run(&mut self, tokens: &[Token<'_>]) {
        self.events.push(Event::DocumentStart);
        for (index, token) in tokens.iter().enumerate() {
            match token {
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => self.start_tag(name, attributes, *self_closing),
                Token::EndTag(name) => self.end_tag(name),
                Token::RawText(text) => self.events.push(Event::Text((*text).to_string())),
                Token::Text(raw) => {
                    let before = index.checked_sub(1).map(|i| &tokens[i]);
                    let after = tokens.get(index + 1);
                    self.text(raw, before, after);
                }
            }
        }
        while let Some(tag) = self.stack.pop() {
            log::debug!("Closing <{}> at end of document", tag);
            self.events.push(Event::ElementEnd { tag });
        }
        self.events.push(Event::DocumentEnd);
    }

    fn start_tag(&mut self, name: &str, raw_attributes: &[(String, &str)], self_closing: bool) {
        if let Some(index) = self.implied_close(name) {
            self.close_down_to(index);
        }

        let mut attributes = Attributes::with_capacity(raw_attributes.len());
        for (key, raw_value) in raw_attributes {
            if attributes.contains_key(key) {
                self.diagnostics.push(Diagnostic::markup(format!(
                    "duplicate attribute '{}' on <{}> ignored",
                    key, name
                )));
                continue;
            }
            let value = decode_entities(raw_value, self.unknown_entity, &mut self.diagnostics);
            attributes.insert(key.clone(), value);
        }

        self.events.push(Event::ElementStart {
            tag: name.to_string(),
            attributes,
        });
        if self_closing || VOID_ELEMENTS.contains(&name) {
            self.events.push(Event::end(name));
        } else {
            self.stack.push(name.to_string());
        }
    }

    fn end_tag(&mut self, name: &str) {
        match self.stack.iter().rposition(|open| open == name) {
            Some(index) => self.close_down_to(index),
            None => self.diagnostics.push(Diagnostic::markup(format!(
                "end tag </{}> has no open element; ignored",
                name
            ))),
        }
    }

    /// Pops and closes every open element from the top of the stack down to
    /// and including `index`.
    fn close_down_to(&mut self, index: usize) {
        while self.stack.len() > index {
            let Some(tag) = self.stack.pop() else { break };
            if self.stack.len() > index {
                log::debug!("Auto-closing <{}>", tag);
            }
            self.events.push(Event::ElementEnd { tag });
        }
    }

    /// The stack index of an open element that `name` implicitly ends.
    fn implied_close(&self, name: &str) -> Option<usize> {
        match name {
            "li" => self.find_open(&["li"], &["ol", "ul", "table"]),
            "dt" | "dd" => self.find_open(&["dt", "dd"], &["dl", "table"]),
            "tr" => self.find_open(&["tr"], &["table", "thead", "tbody", "tfoot"]),
            "td" | "th" => self.find_open(&["td", "th"], &["tr", "table"]),
            "thead" | "tbody" | "tfoot" => self.find_open(&["thead", "tbody", "tfoot"], &["table"]),
            _ if CLOSES_PARAGRAPH.contains(&name) => {
                for (index, open) in self.stack.iter().enumerate().rev() {
                    if open == "p" {
                        return Some(index);
                    }
                    if !PHRASING.contains(&open.as_str()) {
                        return None;
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn find_open(&self, targets: &[&str], barriers: &[&str]) -> Option<usize> {
        for (index, open) in self.stack.iter().enumerate().rev() {
            if targets.contains(&open.as_str()) {
                return Some(index);
            }
            if barriers.contains(&open.as_str()) {
                return None;
            }
        }
        None
    }

    fn text(&mut self, raw: &str, before: Option<&Token<'_>>, after: Option<&Token<'_>>) {
        let preserve = self
            .stack
            .iter()
            .any(|open| PRESERVE_WHITESPACE.contains(&open.as_str()));

        let text = if preserve {
            let mut body = raw;
            if let Some(Token::StartTag { name, .. }) = before
                && name == "pre"
            {
                body = strip_leading_line_break(body);
            }
            decode_entities(body, self.unknown_entity, &mut self.diagnostics)
        } else {
            let collapsed = collapse_whitespace(raw, self.breaks_at(before), self.breaks_at(after));
            decode_entities(&collapsed, self.unknown_entity, &mut self.diagnostics)
        };

        if !text.is_empty() {
            self.events.push(Event::Text(text));
        }
    }

    /// Whether the neighbouring token is a new-line tag boundary. The tag next
    /// to the whitespace decides, not the enclosing element, so a line break
    /// beside an inline tag inside a block still separates words. The edges
    /// of the document count as the boundaries of the root element.
    fn breaks_at(&self, neighbour: Option<&Token<'_>>) -> bool {
        match neighbour {
            None => self.policy.is_new_line_tag(DOCUMENT_TAG),
            Some(Token::StartTag { name, .. }) | Some(Token::EndTag(name)) => self.policy.is_new_line_tag(name),
            Some(Token::Text(_)) | Some(Token::RawText(_)) => false,
        }
    }
}

fn strip_leading_line_break(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .or_else(|| text.strip_prefix('\r'))
        .unwrap_or(text)
}

/// Collapses each whitespace run to a single space. A run touching the start
/// (or end) of the text is dropped instead when `drop_leading` (or
/// `drop_trailing`) is set; a text made only of whitespace is dropped when
/// either side is.
pub fn collapse_whitespace(raw: &str, drop_leading: bool, drop_trailing: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    let mut seen_text = false;

    for c in raw.chars() {
        if c.is_ascii_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && (seen_text || !drop_leading) {
            out.push(' ');
        }
        pending_space = false;
        seen_text = true;
        out.push(c);
    }

    if pending_space {
        let keep = if seen_text {
            !drop_trailing
        } else {
            !drop_leading && !drop_trailing
        };
        if keep {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_types::DiagnosticKind;

    fn parse(html: &str) -> ParseOutput {
        MarkupParser::new(MarkupConfig::default())
            .parse(html.as_bytes(), None)
            .unwrap()
    }

    fn texts(output: &ParseOutput) -> Vec<&str> {
        output
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn tags(output: &ParseOutput) -> Vec<String> {
        output
            .events
            .iter()
            .filter_map(|e| match e {
                Event::ElementStart { tag, .. } => Some(format!("<{}>", tag)),
                Event::ElementEnd { tag } => Some(format!("</{}>", tag)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_carriage_return_collapses_to_space() {
        let output = parse("<p>sometext\r moretext</p>");
        assert_eq!(texts(&output), vec!["sometext moretext"]);
    }

    #[test]
    fn test_whitespace_next_to_block_tags_is_dropped() {
        let output = parse("<div>\n  <p>\n  Hello <b>bold</b>\n  world\n</p>\n</div>");
        assert_eq!(texts(&output), vec!["Hello ", "bold", " world"]);
    }

    #[test]
    fn test_whitespace_between_inline_siblings_is_kept() {
        let output = parse("<p><b>a</b>\n<i>b</i></p>");
        assert_eq!(texts(&output), vec!["a", " ", "b"]);
    }

    #[test]
    fn test_line_break_next_to_inline_tag_inside_block_is_a_space() {
        let output = parse("<p>one <b>two</b>\nthree</p>");
        assert_eq!(texts(&output), vec!["one ", "two", " three"]);
    }

    #[test]
    fn test_adjacent_block_tag_drops_boundary_spaces_without_line_break() {
        let output = parse("<p> a </p><div><span>x</span> </div>");
        assert_eq!(texts(&output), vec!["a", "x"]);
    }

    #[test]
    fn test_never_policy_keeps_boundary_spaces() {
        let config = MarkupConfig {
            new_line: NewLineMode::Never,
            ..Default::default()
        };
        let output = MarkupParser::new(config)
            .parse(b"<p>\n text \n</p>", None)
            .unwrap();
        assert_eq!(texts(&output), vec![" text "]);
    }

    #[test]
    fn test_custom_policy_decides_boundaries() {
        #[derive(Debug)]
        struct SpanOnly;
        impl NewLinePolicy for SpanOnly {
            fn is_new_line_tag(&self, tag: &str) -> bool {
                tag == "span"
            }
        }
        let output = MarkupParser::with_policy(MarkupConfig::default(), Box::new(SpanOnly))
            .parse(b"<p><span> a </span><b> b </b></p>", None)
            .unwrap();
        assert_eq!(texts(&output), vec!["a", " b "]);
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        let output = parse("<pre>\n  a\n    b\n</pre>");
        assert_eq!(texts(&output), vec!["  a\n    b\n"]);
    }

    #[test]
    fn test_crossed_tags_are_balanced() {
        let output = parse("<b><i>text</b></i>");
        assert_eq!(tags(&output), vec!["<b>", "<i>", "</i>", "</b>"]);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::Markup);
    }

    #[test]
    fn test_unclosed_tags_close_at_end() {
        let output = parse("<div><p>text");
        assert_eq!(tags(&output), vec!["<div>", "<p>", "</p>", "</div>"]);
        assert_eq!(output.events.first(), Some(&Event::DocumentStart));
        assert_eq!(output.events.last(), Some(&Event::DocumentEnd));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let output = parse("<p>a<br>b<span/>c</p>");
        assert_eq!(
            tags(&output),
            vec!["<p>", "<br>", "</br>", "<span>", "</span>", "</p>"]
        );
    }

    #[test]
    fn test_implied_list_item_and_paragraph_ends() {
        let output = parse("<ul><li>one<li>two</ul><p>x<div>y</div>");
        assert_eq!(
            tags(&output),
            vec![
                "<ul>", "<li>", "</li>", "<li>", "</li>", "</ul>", "<p>", "</p>", "<div>", "</div>"
            ]
        );
    }

    #[test]
    fn test_names_are_lowercased_and_first_attribute_wins() {
        let output = parse(r#"<DIV Class="a" class="b" title="x &amp; y"></DIV>"#);
        match &output.events[1] {
            Event::ElementStart { tag, attributes } => {
                assert_eq!(tag, "div");
                assert_eq!(attributes.get("class").map(String::as_str), Some("a"));
                assert_eq!(attributes.get("title").map(String::as_str), Some("x & y"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn test_unknown_entity_modes() {
        let literal = parse("<p>a &bogus; b &amp; c</p>");
        assert_eq!(texts(&literal), vec!["a &bogus; b & c"]);
        assert_eq!(literal.diagnostics.len(), 1);

        let config = MarkupConfig {
            unknown_entity: UnknownEntityMode::Placeholder('?'),
            ..Default::default()
        };
        let placeholder = MarkupParser::new(config).parse(b"<p>a &bogus; b</p>", None).unwrap();
        assert_eq!(texts(&placeholder), vec!["a ? b"]);
    }

    #[test]
    fn test_style_body_is_verbatim() {
        let output = parse("<style>p > b { color: red }</style>");
        assert_eq!(texts(&output), vec!["p > b { color: red }"]);
    }

    #[test]
    fn test_undecodable_input_produces_nothing() {
        let parser = MarkupParser::new(MarkupConfig::default());
        let result = parser.parse(b"<p>\xC3\x28</p>", Some("utf-8"));
        assert!(matches!(result, Err(MarkupError::Decoding { .. })));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t\n b  ", true, true), "a b");
        assert_eq!(collapse_whitespace("  a  ", false, false), " a ");
        assert_eq!(collapse_whitespace(" \n ", false, true), "");
        assert_eq!(collapse_whitespace(" \n ", false, false), " ");
    }
}
