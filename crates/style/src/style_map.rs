//! The cascaded style of a single element.
//!
//! A `StyleMap` owns the declarations that won the cascade for one element and
//! keeps a read-only link to its parent's map. Lookups of inherited properties
//! fall through that link, so a child only stores what it sets itself.

use crate::dimension::{Dimension, Margins};
use crate::display::Display;
use crate::font::{FontStyle, FontWeight};
use crate::list::ListStyleType;
use crate::parsers::{
    parse_color, parse_dimension, parse_font_family_list, parse_font_size, parse_font_style,
    parse_font_weight, parse_length_in_context, parse_line_height, run_parser, DEFAULT_FONT_SIZE,
};
use crate::properties::is_inherited;
use crate::text::{TextAlign, TextDecoration};
use sheaf_types::Color;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleMap {
    properties: BTreeMap<String, String>,
    parent: Option<Arc<StyleMap>>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Option<Arc<StyleMap>>) -> Self {
        Self {
            properties: BTreeMap::new(),
            parent,
        }
    }

    pub fn parent(&self) -> Option<&Arc<StyleMap>> {
        self.parent.as_ref()
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(property.into(), value.into());
    }

    pub fn remove(&mut self, property: &str) -> Option<String> {
        self.properties.remove(property)
    }

    /// The value this element declares itself, ignoring ancestors.
    pub fn own(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    /// The effective value: this element's own declaration, or for inherited
    /// properties the nearest ancestor's.
    pub fn get(&self, property: &str) -> Option<&str> {
        if let Some(value) = self.own(property) {
            return Some(value);
        }
        if is_inherited(property) {
            return self.parent.as_deref().and_then(|p| p.get(property));
        }
        None
    }

    pub fn declared(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Replaces the `inherit` keyword for `property` with the parent's computed value.
    /// Relative values are resolved first so they do not compound.
    pub fn inherit_from_parent(&mut self, property: &str) {
        let Some(parent) = self.parent.clone() else {
            self.properties.remove(property);
            return;
        };
        let value = match property {
            "font-size" => Some(format!("{}pt", parent.font_size())),
            "font-weight" => Some(parent.font_weight().numeric_value().to_string()),
            _ => parent.get(property).map(str::to_string),
        };
        match value {
            Some(value) => self.set(property, value),
            None => {
                self.properties.remove(property);
            }
        }
    }

    // --- Typed accessors ---

    pub fn font_families(&self) -> Vec<String> {
        self.get("font-family")
            .map(parse_font_family_list)
            .unwrap_or_default()
    }

    fn parent_font_size(&self) -> f32 {
        self.parent
            .as_deref()
            .map(StyleMap::font_size)
            .unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Computed font size in points.
    pub fn font_size(&self) -> f32 {
        let parent_size = self.parent_font_size();
        match self.own("font-size") {
            Some(value) => parse_font_size(value, parent_size).unwrap_or(parent_size),
            None => parent_size,
        }
    }

    pub fn font_weight(&self) -> FontWeight {
        let parent_weight = self
            .parent
            .as_deref()
            .map(StyleMap::font_weight)
            .unwrap_or_default();
        match self.own("font-weight") {
            Some(value) => parse_font_weight(value, &parent_weight).unwrap_or(parent_weight),
            None => parent_weight,
        }
    }

    pub fn font_style(&self) -> FontStyle {
        self.get("font-style")
            .and_then(|v| parse_font_style(v).ok())
            .unwrap_or_default()
    }

    pub fn color(&self) -> Color {
        self.get("color")
            .and_then(|v| run_parser(parse_color, v).ok())
            .unwrap_or_default()
    }

    pub fn background_color(&self) -> Option<Color> {
        self.own("background-color")
            .and_then(|v| run_parser(parse_color, v).ok())
            .filter(|c| c.a > 0.0)
    }

    pub fn text_decoration(&self) -> TextDecoration {
        self.get("text-decoration")
            .and_then(TextDecoration::parse)
            .unwrap_or_default()
    }

    pub fn text_align(&self) -> TextAlign {
        self.get("text-align")
            .and_then(TextAlign::parse)
            .unwrap_or_default()
    }

    pub fn line_height(&self) -> f32 {
        let size = self.font_size();
        self.get("line-height")
            .and_then(|v| parse_line_height(v, size).ok())
            .unwrap_or(size * 1.2)
    }

    pub fn display(&self) -> Option<Display> {
        self.own("display").and_then(Display::parse)
    }

    pub fn is_hidden(&self) -> bool {
        self.display().is_some_and(|d| d.is_none())
    }

    pub fn list_style_type(&self) -> Option<ListStyleType> {
        self.get("list-style-type").and_then(ListStyleType::parse)
    }

    fn edges(&self, prefix: &str) -> Margins {
        let size = self.font_size();
        let edge = |side: &str| {
            self.own(&format!("{}-{}", prefix, side))
                .and_then(|v| run_parser(|i| parse_length_in_context(i, size), v).ok())
                .unwrap_or(0.0)
        };
        Margins {
            top: edge("top"),
            right: edge("right"),
            bottom: edge("bottom"),
            left: edge("left"),
        }
    }

    pub fn margins(&self) -> Margins {
        self.edges("margin")
    }

    pub fn padding(&self) -> Margins {
        self.edges("padding")
    }

    pub fn width(&self) -> Dimension {
        self.own("width")
            .and_then(|v| run_parser(parse_dimension, v).ok())
            .unwrap_or_default()
    }

    pub fn height(&self) -> Dimension {
        self.own("height")
            .and_then(|v| run_parser(parse_dimension, v).ok())
            .unwrap_or_default()
    }

    pub fn page_break_before(&self) -> bool {
        self.own("page-break-before")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("always"))
    }

    pub fn page_break_after(&self) -> bool {
        self.own("page-break-after")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("always"))
    }
}
