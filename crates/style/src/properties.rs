//! Catalog of the CSS properties the converter understands.

use crate::display::Display;
use crate::font::FontWeight;
use crate::list::{ListStylePosition, ListStyleType};
use crate::parsers::{
    parse_color, parse_dimension, parse_font_size, parse_font_style, parse_font_weight,
    parse_length_in_context, parse_line_height, parse_text_align, run_parser, StyleParseError,
    DEFAULT_FONT_SIZE,
};
use crate::text::TextDecoration;

/// Properties whose value flows from parent to child when the child does not set them.
///
/// `text-decoration` is not inherited in CSS proper, but the decoration of an
/// ancestor still applies to every descendant text run, which is what the
/// inheritance link models here.
pub const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "direction",
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "letter-spacing",
    "line-height",
    "list-style-image",
    "list-style-position",
    "list-style-type",
    "text-align",
    "text-decoration",
    "text-indent",
    "text-transform",
    "visibility",
    "white-space",
    "word-spacing",
];

pub fn is_inherited(property: &str) -> bool {
    INHERITED_PROPERTIES.contains(&property)
}

const LENGTH_PROPERTIES: &[&str] = &[
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "text-indent",
    "letter-spacing",
    "word-spacing",
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
];

fn check(ok: bool, property: &str, value: &str) -> Result<(), StyleParseError> {
    if ok {
        Ok(())
    } else {
        Err(StyleParseError::InvalidValue {
            property: property.to_string(),
            value: value.to_string(),
        })
    }
}

/// Checks a longhand declaration value. Properties outside the catalog are accepted
/// as-is; they are stored but nothing reads them.
pub fn validate(property: &str, value: &str) -> Result<(), StyleParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StyleParseError::invalid(property, value));
    }
    if value.eq_ignore_ascii_case("inherit") || value.eq_ignore_ascii_case("initial") {
        return Ok(());
    }
    if LENGTH_PROPERTIES.contains(&property) {
        let keyword = matches!(value.to_ascii_lowercase().as_str(), "auto" | "normal" | "thin" | "medium" | "thick");
        let ok = keyword || run_parser(|i| parse_length_in_context(i, DEFAULT_FONT_SIZE), value).is_ok();
        return check(ok, property, value);
    }
    match property {
        "color" | "background-color" | "border-top-color" | "border-right-color"
        | "border-bottom-color" | "border-left-color" => {
            run_parser(parse_color, value).map(|_| ())
        }
        "font-size" => parse_font_size(value, DEFAULT_FONT_SIZE).map(|_| ()),
        "font-weight" => parse_font_weight(value, &FontWeight::Regular).map(|_| ()),
        "font-style" => parse_font_style(value).map(|_| ()),
        "font-family" => check(!value.trim_matches(',').trim().is_empty(), property, value),
        "line-height" => parse_line_height(value, DEFAULT_FONT_SIZE).map(|_| ()),
        "text-align" => parse_text_align(value).map(|_| ()),
        "text-decoration" => check(TextDecoration::parse(value).is_some(), property, value),
        "display" => check(Display::parse(value).is_some(), property, value),
        "list-style-type" => check(ListStyleType::parse(value).is_some(), property, value),
        "list-style-position" => check(ListStylePosition::parse(value).is_some(), property, value),
        "width" | "height" => run_parser(parse_dimension, value).map(|_| ()),
        "page-break-before" | "page-break-after" => check(
            matches!(value.to_ascii_lowercase().as_str(), "auto" | "always" | "avoid" | "left" | "right"),
            property,
            value,
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherited_catalog() {
        assert!(is_inherited("color"));
        assert!(is_inherited("font-family"));
        assert!(!is_inherited("margin-top"));
        assert!(!is_inherited("display"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(validate("color", "#00f").is_ok());
        assert!(validate("color", "not-a-color").is_err());
        assert!(validate("margin-top", "2em").is_ok());
        assert!(validate("margin-top", "wide").is_err());
        assert!(validate("font-size", "inherit").is_ok());
        assert!(validate("display", "none").is_ok());
        assert!(validate("x-vendor-thing", "whatever").is_ok());
        assert!(validate("color", "  ").is_err());
    }
}
