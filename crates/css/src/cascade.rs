//! The cascade: which declaration wins for each property of one element.
//!
//! Candidates are ordered by `(importance, origin, specificity, source
//! order)` and folded into a `StyleMap`, so the last one standing wins.
//! Origins from lowest to highest are the built-in stylesheet, presentational
//! HTML attributes and author stylesheets. Inline `style` declarations are
//! author declarations that outrank every selector.

use crate::selector::{Element, Specificity};
use crate::stylesheet::{parse_declarations, PageSettings, Stylesheet};
use sheaf_style::properties::validate;
use sheaf_style::StyleMap;
use sheaf_types::Diagnostic;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    UserAgent,
    Presentational,
    Author,
}

#[derive(Debug)]
struct Candidate<'a> {
    property: &'a str,
    value: &'a str,
    important: bool,
    origin: Origin,
    specificity: Specificity,
    sheet: usize,
    order: usize,
}

impl Candidate<'_> {
    fn key(&self) -> (bool, Origin, Specificity, usize, usize) {
        (self.important, self.origin, self.specificity, self.sheet, self.order)
    }
}

/// Resolves element styles against an ordered list of shared stylesheets.
#[derive(Debug, Clone, Default)]
pub struct CssResolver {
    user_agent: Option<Arc<Stylesheet>>,
    sheets: Vec<Arc<Stylesheet>>,
}

impl CssResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the stylesheet that supplies element defaults.
    pub fn with_user_agent(mut self, sheet: Arc<Stylesheet>) -> Self {
        self.user_agent = Some(sheet);
        self
    }

    /// Appends an author stylesheet. Later sheets win ties with earlier ones.
    pub fn add_stylesheet(&mut self, sheet: Arc<Stylesheet>) {
        self.sheets.push(sheet);
    }

    pub fn stylesheets(&self) -> &[Arc<Stylesheet>] {
        &self.sheets
    }

    /// The `@page` settings of all author sheets, later sheets taking precedence.
    pub fn page_settings(&self) -> PageSettings {
        let mut settings = PageSettings::default();
        for sheet in &self.sheets {
            settings.merge(&sheet.page);
        }
        settings
    }

    /// Computes the style of `element`. `ancestors` runs from the root down to
    /// the element's parent and `parent` is the parent's resolved style.
    pub fn resolve(
        &self,
        element: &Element,
        ancestors: &[Element],
        parent: Option<Arc<StyleMap>>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> StyleMap {
        let hints = presentational_hints(element);
        let inline = element
            .attribute("style")
            .map(|text| parse_declarations(text, diagnostics))
            .unwrap_or_default();

        let mut candidates = Vec::new();
        if let Some(sheet) = &self.user_agent {
            collect(sheet, 0, Origin::UserAgent, element, ancestors, &mut candidates);
        }
        candidates.extend(hints.iter().enumerate().map(|(order, (property, value))| Candidate {
            property,
            value,
            important: false,
            origin: Origin::Presentational,
            specificity: Specificity::default(),
            sheet: 0,
            order,
        }));
        for (index, sheet) in self.sheets.iter().enumerate() {
            collect(sheet, index, Origin::Author, element, ancestors, &mut candidates);
        }
        candidates.extend(inline.iter().enumerate().map(|(order, declaration)| Candidate {
            property: &declaration.property,
            value: &declaration.value,
            important: declaration.important,
            origin: Origin::Author,
            specificity: Specificity::INLINE,
            sheet: usize::MAX,
            order,
        }));

        // Stable, so declarations of one rule keep their written order.
        candidates.sort_by_key(Candidate::key);

        let mut style = StyleMap::with_parent(parent);
        for candidate in &candidates {
            style.set(candidate.property, candidate.value);
        }
        resolve_keywords(&mut style);
        style
    }
}

fn collect<'a>(
    sheet: &'a Stylesheet,
    index: usize,
    origin: Origin,
    element: &Element,
    ancestors: &[Element],
    candidates: &mut Vec<Candidate<'a>>,
) {
    for rule in &sheet.rules {
        if !rule.selector.matches(element, ancestors) {
            continue;
        }
        candidates.extend(rule.declarations.iter().map(|declaration| Candidate {
            property: &declaration.property,
            value: &declaration.value,
            important: declaration.important,
            origin,
            specificity: rule.specificity,
            sheet: index,
            order: rule.order,
        }));
    }
}

fn initial_value(property: &str) -> Option<&'static str> {
    match property {
        "color" => Some("black"),
        "font-size" => Some("medium"),
        "font-weight" | "font-style" | "line-height" => Some("normal"),
        "text-align" => Some("left"),
        "text-decoration" => Some("none"),
        "list-style-type" => Some("disc"),
        "list-style-position" => Some("outside"),
        _ => None,
    }
}

/// Applies `inherit` and `initial` after the winner of each property is known.
fn resolve_keywords(style: &mut StyleMap) {
    let keywords: Vec<(String, bool)> = style
        .declared()
        .filter_map(|(property, value)| {
            if value.eq_ignore_ascii_case("inherit") {
                Some((property.to_string(), true))
            } else if value.eq_ignore_ascii_case("initial") {
                Some((property.to_string(), false))
            } else {
                None
            }
        })
        .collect();
    for (property, inherit) in keywords {
        if inherit {
            style.inherit_from_parent(&property);
            continue;
        }
        match initial_value(&property) {
            Some(value) => style.set(property, value),
            None => {
                style.remove(&property);
            }
        }
    }
}

const ALIGNABLE: &[&str] = &[
    "caption", "div", "h1", "h2", "h3", "h4", "h5", "h6", "p", "td", "th", "tr",
];

/// `<font size>` steps 1 to 7.
const FONT_SIZE_STEPS: [&str; 7] = ["7.5pt", "10pt", "12pt", "13.5pt", "18pt", "24pt", "36pt"];

fn html_length(value: &str) -> String {
    let value = value.trim();
    if value.parse::<f32>().is_ok() {
        format!("{}px", value)
    } else {
        value.to_string()
    }
}

fn font_size_step(value: &str) -> Option<&'static str> {
    let value = value.trim();
    let step: i32 = if let Some(delta) = value.strip_prefix('+') {
        3 + delta.parse::<i32>().ok()?
    } else if value.starts_with('-') {
        3 + value.parse::<i32>().ok()?
    } else {
        value.parse().ok()?
    };
    FONT_SIZE_STEPS.get((step.clamp(1, 7) - 1) as usize).copied()
}

/// Legacy HTML attributes mapped to the properties they stand for. Values
/// that do not validate are skipped.
fn presentational_hints(element: &Element) -> Vec<(String, String)> {
    let tag = element.tag.as_str();
    let mut hints = Vec::new();
    let mut hint = |property: &str, value: String| {
        if validate(property, &value).is_ok() {
            hints.push((property.to_string(), value));
        }
    };

    if element.attributes.contains_key("hidden") {
        hint("display", "none".to_string());
    }
    if let Some(align) = element.attribute("align")
        && ALIGNABLE.contains(&tag)
    {
        hint("text-align", align.trim().to_ascii_lowercase());
    }
    if let Some(color) = element.attribute("bgcolor")
        && matches!(tag, "body" | "table" | "tr" | "td" | "th")
    {
        hint("background-color", color.trim().to_string());
    }
    if tag == "font" {
        if let Some(color) = element.attribute("color") {
            hint("color", color.trim().to_string());
        }
        if let Some(face) = element.attribute("face") {
            hint("font-family", face.trim().to_string());
        }
        if let Some(size) = element.attribute("size").and_then(font_size_step) {
            hint("font-size", size.to_string());
        }
    }
    if let Some(width) = element.attribute("width")
        && matches!(tag, "table" | "td" | "th" | "img" | "col" | "hr")
    {
        hint("width", html_length(width));
    }
    if let Some(height) = element.attribute("height")
        && matches!(tag, "img" | "td" | "th" | "tr")
    {
        hint("height", html_length(height));
    }
    hints
}
