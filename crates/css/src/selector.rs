//! Selectors: parsing, specificity and matching against an element and its
//! ancestor chain.
//!
//! Supported: type, universal, `#id`, `.class`, attribute predicates, the
//! descendant and child combinators, and `:first-child`. Anything else makes
//! the whole selector invalid.

use crate::error::CssError;
use indexmap::IndexMap;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt, value};
use nom::multi::many1;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};

/// `(ids, classes + attributes + pseudo-classes, types)`, compared lexicographically.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Specificity(pub u16, pub u16, pub u16);

impl Specificity {
    /// Declarations from a `style` attribute outrank every selector.
    pub const INLINE: Specificity = Specificity(u16::MAX, 0, 0);
}

/// The parts of an element that selectors look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: IndexMap<String, String>,
    pub first_child: bool,
}

impl Element {
    pub fn new(tag: impl Into<String>, attributes: IndexMap<String, String>) -> Self {
        let id = attributes.get("id").filter(|id| !id.is_empty()).cloned();
        let classes = attributes
            .get("class")
            .map(|list| list.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            tag: tag.into(),
            id,
            classes,
            attributes,
            first_child: false,
        }
    }

    pub fn with_first_child(mut self, first_child: bool) -> Self {
        self.first_child = first_child;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub op: AttrOp,
    pub value: String,
}

impl AttributeSelector {
    fn matches(&self, element: &Element) -> bool {
        let Some(actual) = element.attribute(&self.name) else {
            return false;
        };
        let wanted = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == wanted,
            AttrOp::Includes => actual.split_whitespace().any(|part| part == wanted),
            AttrOp::DashMatch => {
                actual == wanted
                    || (actual.starts_with(wanted) && actual[wanted.len()..].starts_with('-'))
            }
            // An empty operand never matches for the substring operators.
            AttrOp::Prefix => !wanted.is_empty() && actual.starts_with(wanted),
            AttrOp::Suffix => !wanted.is_empty() && actual.ends_with(wanted),
            AttrOp::Substring => !wanted.is_empty() && actual.contains(wanted),
        }
    }
}

/// A sequence of simple selectors with no combinator between them, e.g. `p.note[lang]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundSelector {
    /// `None` matches any element type.
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub first_child: bool,
}

impl CompoundSelector {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag
            && *tag != element.tag
        {
            return false;
        }
        if !self.ids.iter().all(|id| element.id.as_deref() == Some(id.as_str())) {
            return false;
        }
        if !self.classes.iter().all(|class| element.classes.contains(class)) {
            return false;
        }
        if self.first_child && !element.first_child {
            return false;
        }
        self.attributes.iter().all(|attribute| attribute.matches(element))
    }

    fn specificity(&self) -> Specificity {
        Specificity(
            self.ids.len() as u16,
            (self.classes.len() + self.attributes.len() + usize::from(self.first_child)) as u16,
            u16::from(self.tag.is_some()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// A complex selector. `combinators[i]` sits between `parts[i]` and `parts[i + 1]`;
/// the last part is the subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    parts: Vec<CompoundSelector>,
    combinators: Vec<Combinator>,
    text: String,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, CssError> {
        parse_selector(input)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn specificity(&self) -> Specificity {
        self.parts.iter().fold(Specificity::default(), |acc, part| {
            let s = part.specificity();
            Specificity(acc.0 + s.0, acc.1 + s.1, acc.2 + s.2)
        })
    }

    /// `ancestors` runs from the root down to the element's parent.
    pub fn matches(&self, element: &Element, ancestors: &[Element]) -> bool {
        let Some((subject, rest)) = self.parts.split_last() else {
            return false;
        };
        if !subject.matches(element) {
            return false;
        }
        match_ancestors(rest, &self.combinators, ancestors)
    }
}

/// Matches `parts` right to left against `ancestors`, backtracking over
/// descendant combinators.
fn match_ancestors(parts: &[CompoundSelector], combinators: &[Combinator], ancestors: &[Element]) -> bool {
    let Some((part, rest)) = parts.split_last() else {
        return true;
    };
    let Some((combinator, rest_combinators)) = combinators.split_last() else {
        return false;
    };
    match combinator {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, above)) => part.matches(parent) && match_ancestors(rest, rest_combinators, above),
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len())
            .rev()
            .any(|i| part.matches(&ancestors[i]) && match_ancestors(rest, rest_combinators, &ancestors[..i])),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Component {
    Universal,
    Type(String),
    Id(String),
    Class(String),
    Attribute(AttributeSelector),
    FirstChild,
    Pseudo(String),
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_' || c == '\\').parse(input)
}

fn universal(input: &str) -> IResult<&str, Component> {
    value(Component::Universal, char('*')).parse(input)
}

fn type_selector(input: &str) -> IResult<&str, Component> {
    map(ident, |name| Component::Type(name.to_ascii_lowercase())).parse(input)
}

fn id_selector(input: &str) -> IResult<&str, Component> {
    map(preceded(char('#'), ident), |id| Component::Id(id.to_string())).parse(input)
}

fn class_selector(input: &str) -> IResult<&str, Component> {
    map(preceded(char('.'), ident), |class| Component::Class(class.to_string())).parse(input)
}

fn attr_op(input: &str) -> IResult<&str, AttrOp> {
    alt((
        value(AttrOp::Includes, tag("~=")),
        value(AttrOp::DashMatch, tag("|=")),
        value(AttrOp::Prefix, tag("^=")),
        value(AttrOp::Suffix, tag("$=")),
        value(AttrOp::Substring, tag("*=")),
        value(AttrOp::Equals, tag("=")),
    ))
    .parse(input)
}

fn attr_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        take_while1(|c: char| c != ']' && !c.is_whitespace()),
    ))
    .parse(input)
}

fn attribute_selector(input: &str) -> IResult<&str, Component> {
    map(
        (
            char('['),
            multispace0,
            ident,
            multispace0,
            opt((attr_op, multispace0, attr_value, multispace0)),
            char(']'),
        ),
        |(_, _, name, _, predicate, _)| {
            let (op, value) = match predicate {
                Some((op, _, value, _)) => (op, value.to_string()),
                None => (AttrOp::Exists, String::new()),
            };
            Component::Attribute(AttributeSelector {
                name: name.to_ascii_lowercase(),
                op,
                value,
            })
        },
    )
    .parse(input)
}

fn pseudo_class(input: &str) -> IResult<&str, Component> {
    map(preceded((char(':'), opt(char(':'))), ident), |name| {
        if name.eq_ignore_ascii_case("first-child") {
            Component::FirstChild
        } else {
            Component::Pseudo(name.to_ascii_lowercase())
        }
    })
    .parse(input)
}

fn components(input: &str) -> IResult<&str, Vec<Component>> {
    many1(alt((
        universal,
        type_selector,
        id_selector,
        class_selector,
        attribute_selector,
        pseudo_class,
    )))
    .parse(input)
}

fn parse_compound(text: &str, whole: &str) -> Result<CompoundSelector, CssError> {
    let invalid = |reason: String| CssError::Selector {
        selector: whole.to_string(),
        reason,
    };
    let list = match components(text) {
        Ok(("", list)) => list,
        Ok((rest, _)) => return Err(invalid(format!("unexpected '{}'", rest))),
        Err(_) => return Err(invalid(format!("cannot parse '{}'", text))),
    };

    let mut compound = CompoundSelector::default();
    for (position, component) in list.into_iter().enumerate() {
        match component {
            Component::Universal | Component::Type(_) if position > 0 => {
                return Err(invalid("type selector must come first".to_string()));
            }
            Component::Universal => {}
            Component::Type(name) => compound.tag = Some(name),
            Component::Id(id) => compound.ids.push(id),
            Component::Class(class) => compound.classes.push(class),
            Component::Attribute(attribute) => compound.attributes.push(attribute),
            Component::FirstChild => compound.first_child = true,
            Component::Pseudo(name) => {
                return Err(invalid(format!("unsupported pseudo-class ':{}'", name)));
            }
        }
    }
    Ok(compound)
}

enum Piece<'a> {
    Compound(&'a str),
    Combinator(Option<Combinator>),
}

/// Splits a selector into compound texts and the combinators between them.
/// Brackets and quotes are respected so `[title="a > b"]` stays whole.
fn split_pieces(selector: &str) -> Result<Vec<Piece<'_>>, CssError> {
    let invalid = |reason: &str| CssError::Selector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    };
    let mut pieces = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in selector.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if depth > 0 => quote = Some(c),
            '[' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ']' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => {
                if let Some(s) = start.take() {
                    pieces.push(Piece::Compound(&selector[s..i]));
                }
                let combinator = match c {
                    '>' => Some(Combinator::Child),
                    '+' | '~' => return Err(invalid("sibling combinators are not supported")),
                    _ => None,
                };
                match pieces.last_mut() {
                    Some(Piece::Combinator(existing)) => {
                        if combinator.is_some() {
                            if existing.is_some() {
                                return Err(invalid("two combinators in a row"));
                            }
                            *existing = combinator;
                        }
                    }
                    Some(Piece::Compound(_)) => pieces.push(Piece::Combinator(combinator)),
                    None if combinator.is_some() => return Err(invalid("selector starts with a combinator")),
                    None => {}
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if quote.is_some() || depth > 0 {
        return Err(invalid("unterminated attribute selector"));
    }
    if let Some(s) = start {
        pieces.push(Piece::Compound(&selector[s..]));
    }
    if let Some(Piece::Combinator(combinator)) = pieces.last() {
        if combinator.is_some() {
            return Err(invalid("selector ends with a combinator"));
        }
        pieces.pop();
    }
    Ok(pieces)
}

pub fn parse_selector(input: &str) -> Result<Selector, CssError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(CssError::Selector {
            selector: String::new(),
            reason: "empty selector".to_string(),
        });
    }
    let mut parts = Vec::new();
    let mut combinators = Vec::new();
    for piece in split_pieces(text)? {
        match piece {
            Piece::Compound(compound) => parts.push(parse_compound(compound, text)?),
            Piece::Combinator(combinator) => combinators.push(combinator.unwrap_or(Combinator::Descendant)),
        }
    }
    Ok(Selector {
        parts,
        combinators,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, attributes: &[(&str, &str)]) -> Element {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Element::new(tag, attributes)
    }

    #[test]
    fn test_specificity() {
        let cases = [
            ("*", Specificity(0, 0, 0)),
            ("p", Specificity(0, 0, 1)),
            ("p.note", Specificity(0, 1, 1)),
            ("#main p", Specificity(1, 0, 1)),
            ("div > p:first-child", Specificity(0, 1, 2)),
            ("a[href^=http].ext", Specificity(0, 2, 1)),
        ];
        for (text, expected) in cases {
            assert_eq!(parse_selector(text).unwrap().specificity(), expected, "{}", text);
        }
    }

    #[test]
    fn test_compound_matching() {
        let selector = parse_selector("p.note#x").unwrap();
        assert!(selector.matches(&element("p", &[("class", "a note"), ("id", "x")]), &[]));
        assert!(!selector.matches(&element("p", &[("class", "note")]), &[]));
        assert!(!selector.matches(&element("div", &[("class", "note"), ("id", "x")]), &[]));
    }

    #[test]
    fn test_attribute_operators() {
        let link = element("a", &[("href", "https://x.org/doc.pdf"), ("lang", "en-US"), ("rel", "nofollow external")]);
        let matching = [
            "[href]",
            "[lang=en-US]",
            "[lang|=en]",
            "[rel~=external]",
            "[href^='https']",
            "[href$=\".pdf\"]",
            "[href*=x.org]",
        ];
        for text in matching {
            assert!(parse_selector(text).unwrap().matches(&link, &[]), "{}", text);
        }
        assert!(!parse_selector("[lang|=e]").unwrap().matches(&link, &[]));
        assert!(!parse_selector("[title]").unwrap().matches(&link, &[]));
    }

    #[test]
    fn test_combinators() {
        let ancestors = vec![element("div", &[("id", "main")]), element("ul", &[]), element("li", &[])];
        let target = element("b", &[]);

        assert!(parse_selector("#main b").unwrap().matches(&target, &ancestors));
        assert!(parse_selector("li > b").unwrap().matches(&target, &ancestors));
        assert!(parse_selector("div ul>li b").unwrap().matches(&target, &ancestors));
        assert!(!parse_selector("ul > b").unwrap().matches(&target, &ancestors));
        assert!(!parse_selector("p b").unwrap().matches(&target, &ancestors));
    }

    #[test]
    fn test_descendant_backtracking() {
        // `div > p span`: the first `p` found walking up is not a child of a div,
        // the outer one is.
        let ancestors = vec![element("div", &[]), element("p", &[]), element("section", &[]), element("p", &[])];
        let target = element("span", &[]);
        assert!(parse_selector("div > p span").unwrap().matches(&target, &ancestors));
    }

    #[test]
    fn test_first_child() {
        let selector = parse_selector("li:first-child").unwrap();
        assert!(selector.matches(&element("li", &[]).with_first_child(true), &[]));
        assert!(!selector.matches(&element("li", &[]), &[]));
    }

    #[test]
    fn test_invalid_selectors() {
        for text in ["p + q", "a:hover", "> p", "p >", "p[", "", "div*"] {
            assert!(parse_selector(text).is_err(), "{}", text);
        }
    }
}
