//! Stylesheet model and parser.
//!
//! Parsing never fails as a whole. Malformed selectors, declarations and
//! at-rules are dropped one at a time and reported as diagnostics.

use crate::error::CssError;
use crate::media::media_matches;
use crate::selector::{parse_selector, Selector, Specificity};
use crate::shorthand;
use sheaf_style::parsers::{parse_length, parse_page_size, run_parser};
use sheaf_style::properties::validate;
use sheaf_style::{Margins, PageSize};
use sheaf_traits::{ResourceError, ResourceProvider};
use sheaf_types::Diagnostic;
use std::sync::Arc;

const DEFAULT_MEDIUM: &str = "print";
const MAX_IMPORT_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// One selector with the declarations of the rule it came from. A selector
/// list `a, b { .. }` yields one `Rule` per selector sharing the declarations.
#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: Selector,
    pub specificity: Specificity,
    pub declarations: Arc<Vec<Declaration>>,
    /// Position within the stylesheet; later rules win ties.
    pub order: usize,
}

/// Page geometry captured from `@page` rules. Unset fields leave the
/// configured value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSettings {
    pub size: Option<PageSize>,
    pub margin_top: Option<f32>,
    pub margin_right: Option<f32>,
    pub margin_bottom: Option<f32>,
    pub margin_left: Option<f32>,
}

impl PageSettings {
    pub fn is_empty(&self) -> bool {
        *self == PageSettings::default()
    }

    /// Fields set in `other` replace ours.
    pub fn merge(&mut self, other: &PageSettings) {
        if other.size.is_some() {
            self.size = other.size.clone();
        }
        self.margin_top = other.margin_top.or(self.margin_top);
        self.margin_right = other.margin_right.or(self.margin_right);
        self.margin_bottom = other.margin_bottom.or(self.margin_bottom);
        self.margin_left = other.margin_left.or(self.margin_left);
    }

    pub fn apply_margins(&self, base: &Margins) -> Margins {
        Margins {
            top: self.margin_top.unwrap_or(base.top),
            right: self.margin_right.unwrap_or(base.right),
            bottom: self.margin_bottom.unwrap_or(base.bottom),
            left: self.margin_left.unwrap_or(base.left),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    pub page: PageSettings,
}

impl Stylesheet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parses with the default medium (`print`) and no import support.
pub fn parse_stylesheet(source: &str) -> (Stylesheet, Vec<Diagnostic>) {
    StylesheetParser::new().parse(source)
}

/// Stylesheet parser configured with a target medium and, optionally, a
/// resource provider for `@import`.
#[derive(Debug, Clone)]
pub struct StylesheetParser<'r> {
    medium: String,
    resources: Option<&'r dyn ResourceProvider>,
}

impl Default for StylesheetParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> StylesheetParser<'r> {
    pub fn new() -> Self {
        Self {
            medium: DEFAULT_MEDIUM.to_string(),
            resources: None,
        }
    }

    pub fn with_medium(mut self, medium: impl Into<String>) -> Self {
        self.medium = medium.into().to_ascii_lowercase();
        self
    }

    pub fn with_resources(mut self, resources: &'r dyn ResourceProvider) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn parse(&self, source: &str) -> (Stylesheet, Vec<Diagnostic>) {
        let mut sheet = Stylesheet::default();
        let mut errors = Vec::new();
        let mut imports = Vec::new();
        self.parse_into(source, &mut sheet, &mut errors, &mut imports);
        let diagnostics = errors.iter().map(CssError::to_diagnostic).collect();
        log::debug!("Parsed stylesheet: {} rules, {} problems", sheet.rules.len(), errors.len());
        (sheet, diagnostics)
    }

    fn parse_into(&self, source: &str, sheet: &mut Stylesheet, errors: &mut Vec<CssError>, imports: &mut Vec<String>) {
        let source = strip_comments(source);
        let mut rest = source.as_str();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            match find_top_level(rest, &['{', ';', '}']) {
                None => {
                    errors.push(CssError::Unbalanced(snippet(rest)));
                    break;
                }
                Some((index, '}')) => {
                    errors.push(CssError::Unbalanced(snippet(rest)));
                    rest = &rest[index + 1..];
                }
                Some((index, ';')) => {
                    self.statement(rest[..index].trim(), sheet, errors, imports);
                    rest = &rest[index + 1..];
                }
                Some((index, _)) => {
                    let prelude = rest[..index].trim();
                    let (block, next) = match matching_brace(rest, index) {
                        Some(close) => (&rest[index + 1..close], &rest[close + 1..]),
                        None => {
                            errors.push(CssError::Unbalanced(snippet(prelude)));
                            (&rest[index + 1..], "")
                        }
                    };
                    self.block(prelude, block, sheet, errors, imports);
                    rest = next;
                }
            }
        }
    }

    fn statement(&self, text: &str, sheet: &mut Stylesheet, errors: &mut Vec<CssError>, imports: &mut Vec<String>) {
        let Some((name, condition)) = at_rule(text) else {
            errors.push(CssError::MalformedDeclaration(snippet(text)));
            return;
        };
        match name.as_str() {
            "import" => self.import(condition, sheet, errors, imports),
            "charset" | "namespace" => {}
            _ => errors.push(CssError::UnsupportedAtRule(name)),
        }
    }

    fn block(
        &self,
        prelude: &str,
        block: &str,
        sheet: &mut Stylesheet,
        errors: &mut Vec<CssError>,
        imports: &mut Vec<String>,
    ) {
        if let Some((name, condition)) = at_rule(prelude) {
            match name.as_str() {
                "media" => {
                    if media_matches(condition, &self.medium) {
                        self.parse_into(block, sheet, errors, imports);
                    } else {
                        log::debug!("Skipping @media {} for medium '{}'", condition.trim(), self.medium);
                    }
                }
                "page" if condition.trim().is_empty() => page_rule(block, &mut sheet.page, errors),
                "page" => errors.push(CssError::UnsupportedAtRule(format!("page {}", condition.trim()))),
                _ => errors.push(CssError::UnsupportedAtRule(name)),
            }
            return;
        }

        let declarations = declarations_into(block, errors);
        if declarations.is_empty() {
            return;
        }
        let declarations = Arc::new(declarations);
        for text in split_top_level(prelude, ',') {
            match parse_selector(text) {
                Ok(selector) => {
                    let order = sheet.rules.len();
                    sheet.rules.push(Rule {
                        specificity: selector.specificity(),
                        selector,
                        declarations: Arc::clone(&declarations),
                        order,
                    });
                }
                Err(err) => errors.push(err),
            }
        }
    }

    fn import(&self, condition: &str, sheet: &mut Stylesheet, errors: &mut Vec<CssError>, imports: &mut Vec<String>) {
        let Some((href, media)) = import_target(condition) else {
            errors.push(CssError::MalformedDeclaration(format!("@import {}", condition.trim())));
            return;
        };
        if !media_matches(media, &self.medium) {
            log::debug!("Skipping @import '{}' for medium '{}'", href, self.medium);
            return;
        }
        let import_error = |source| CssError::Import {
            href: href.to_string(),
            source,
        };
        let Some(resources) = self.resources else {
            errors.push(import_error(ResourceError::Unsupported("no resource provider configured".to_string())));
            return;
        };
        if imports.len() >= MAX_IMPORT_DEPTH || imports.iter().any(|seen| seen == href) {
            errors.push(import_error(ResourceError::LoadFailed {
                path: href.to_string(),
                message: "import cycle or nesting too deep".to_string(),
            }));
            return;
        }
        match resources.load(href) {
            Ok(bytes) => {
                imports.push(href.to_string());
                let text = String::from_utf8_lossy(&bytes);
                self.parse_into(&text, sheet, errors, imports);
                imports.pop();
            }
            Err(err) => errors.push(import_error(err)),
        }
    }
}

/// Parses a declaration block such as the body of a rule or a `style`
/// attribute. Shorthands are expanded and every longhand is validated.
pub fn parse_declarations(block: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Declaration> {
    let mut errors = Vec::new();
    let declarations = declarations_into(block, &mut errors);
    diagnostics.extend(errors.iter().map(CssError::to_diagnostic));
    declarations
}

fn declarations_into(block: &str, errors: &mut Vec<CssError>) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for text in split_top_level(block, ';') {
        let Some((name, value)) = text.split_once(':') else {
            errors.push(CssError::MalformedDeclaration(text.to_string()));
            continue;
        };
        let property = name.trim().to_ascii_lowercase();
        let (value, important) = strip_important(value.trim());
        if property.is_empty() || value.is_empty() {
            errors.push(CssError::MalformedDeclaration(text.to_string()));
            continue;
        }
        let longhands = match shorthand::expand(&property, value) {
            Ok(longhands) => longhands,
            Err(source) => {
                errors.push(CssError::Declaration {
                    declaration: text.to_string(),
                    source,
                });
                continue;
            }
        };
        for (property, value) in longhands {
            match validate(&property, &value) {
                Ok(()) => declarations.push(Declaration {
                    property,
                    value,
                    important,
                }),
                Err(source) => errors.push(CssError::Declaration {
                    declaration: text.to_string(),
                    source,
                }),
            }
        }
    }
    declarations
}

fn strip_important(value: &str) -> (&str, bool) {
    if let Some(bang) = value.rfind('!') {
        let flag = value[bang + 1..].trim();
        if flag.eq_ignore_ascii_case("important") {
            return (value[..bang].trim_end(), true);
        }
    }
    (value, false)
}

fn page_rule(block: &str, page: &mut PageSettings, errors: &mut Vec<CssError>) {
    for declaration in declarations_into(block, errors) {
        let value = declaration.value.as_str();
        let margin = || run_parser(parse_length, value).ok();
        match declaration.property.as_str() {
            "size" => match run_parser(parse_page_size, value) {
                Ok(size) => page.size = Some(size),
                Err(source) => errors.push(CssError::Declaration {
                    declaration: format!("size: {}", value),
                    source,
                }),
            },
            "margin-top" => page.margin_top = margin(),
            "margin-right" => page.margin_right = margin(),
            "margin-bottom" => page.margin_bottom = margin(),
            "margin-left" => page.margin_left = margin(),
            other => errors.push(CssError::UnsupportedAtRule(format!("page property '{}'", other))),
        }
    }
}

/// Splits `@name rest` into the lower-cased name and the rest.
fn at_rule(text: &str) -> Option<(String, &str)> {
    let body = text.strip_prefix('@')?;
    let end = body
        .find(|c: char| !(c.is_alphanumeric() || c == '-'))
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }
    Some((body[..end].to_ascii_lowercase(), &body[end..]))
}

/// `url("a.css") print`, `url(a.css)` or `"a.css" screen` into the target and the media list.
fn import_target(condition: &str) -> Option<(&str, &str)> {
    let text = condition.trim();
    let (inner, rest) = if text.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url(")) {
        let close = text.find(')')?;
        (&text[4..close], &text[close + 1..])
    } else {
        let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let close = text[1..].find(quote)? + 1;
        (&text[..=close], &text[close + 1..])
    };
    let href = inner.trim().trim_matches(|c| c == '"' || c == '\'');
    if href.is_empty() {
        return None;
    }
    Some((href, rest))
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
        out.push(' ');
    }
    out.push_str(rest);
    out
}

/// First occurrence of any of `targets` outside quotes, parentheses and brackets.
fn find_top_level(text: &str, targets: &[char]) -> Option<(usize, char)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 && targets.contains(&c) => return Some((i, c)),
            _ => {}
        }
    }
    None
}

/// Index of the `}` closing the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some((index, _)) = find_top_level(rest, &[separator]) {
        parts.push(&rest[..index]);
        rest = &rest[index + 1..];
    }
    parts.push(rest);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn snippet(text: &str) -> String {
    text.chars().take(40).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheaf_traits::InMemoryResourceProvider;
    use sheaf_types::DiagnosticKind;

    #[test]
    fn test_rules_and_selector_lists() {
        let (sheet, diagnostics) = parse_stylesheet(
            "/* heading */ h1, h2.title { color: red; margin: 0 } p { font-weight: bold !important }",
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(sheet.rules.len(), 3);
        assert_eq!(sheet.rules[1].selector.as_str(), "h2.title");
        assert_eq!(sheet.rules[0].declarations.len(), 5);
        assert!(sheet.rules[2].declarations[0].important);
        assert_eq!(sheet.rules.iter().map(|r| r.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_bad_parts_are_dropped() {
        let (sheet, diagnostics) =
            parse_stylesheet("p { color: nonsense; font-size: 10pt } a:hover, a { color: blue } { }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations.len(), 1);
        assert_eq!(sheet.rules[1].selector.as_str(), "a");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::Style));
    }

    #[test]
    fn test_media_blocks() {
        let css = "@media screen { p { color: red } } @media print { p { color: blue } } em { color: green }";
        let (sheet, _) = parse_stylesheet(css);
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations[0].value, "blue");

        let (screen, _) = StylesheetParser::new().with_medium("screen").parse(css);
        assert_eq!(screen.rules[0].declarations[0].value, "red");
    }

    #[test]
    fn test_page_rule() {
        let (sheet, diagnostics) = parse_stylesheet("@page { size: A5 landscape; margin: 36pt 1in }");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(sheet.page.size, Some(PageSize::A5.landscape()));
        assert_eq!(sheet.page.margin_top, Some(36.0));
        assert_eq!(sheet.page.margin_left, Some(72.0));
        assert!(sheet.rules.is_empty());
    }

    #[test]
    fn test_unsupported_at_rules() {
        let (sheet, diagnostics) = parse_stylesheet("@font-face { font-family: X; src: url(x.ttf) } p { color: red }");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Unsupported);
    }

    #[test]
    fn test_import_through_provider() {
        let resources = InMemoryResourceProvider::new();
        resources.add("base.css", b"p { color: gray }".to_vec()).unwrap();
        let parser = StylesheetParser::new().with_resources(&resources);

        let (sheet, diagnostics) = parser.parse("@import url(\"base.css\"); @import 'missing.css'; p { color: black }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations[0].value, "gray");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Resource);
    }

    #[test]
    fn test_non_ascii_import_target_is_dropped() {
        let (sheet, diagnostics) = parse_stylesheet("@import aéé; @import éurl(x.css); p { color: red }");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::Style));
    }

    #[test]
    fn test_import_cycle_is_stopped() {
        let resources = InMemoryResourceProvider::new();
        resources.add("a.css", b"@import 'b.css'; a { color: red }".to_vec()).unwrap();
        resources.add("b.css", b"@import 'a.css'; b { color: red }".to_vec()).unwrap();
        let (sheet, diagnostics) = StylesheetParser::new().with_resources(&resources).parse("@import 'a.css';");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_inline_declarations() {
        let mut diagnostics = Vec::new();
        let declarations = parse_declarations("color: red; ; background: url('a;b.png') white", &mut diagnostics);
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[1].property, "background-color");
        assert!(diagnostics.is_empty());
    }
}
