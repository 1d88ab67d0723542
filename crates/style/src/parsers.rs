//! Low-level nom parser functions for CSS style values.
//!
//! This module provides composable parser functions for parsing style values
//! like lengths, dimensions, colors, and page sizes, plus high-level helpers
//! that turn a raw declaration value into a typed value.

use crate::dimension::{Dimension, Margins, PageSize};
use crate::font::{FontStyle, FontWeight};
use crate::text::TextAlign;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while_m_n};
use nom::character::complete::{char, digit1, multispace0, space0, space1};
use nom::combinator::{map, map_res, opt, recognize, value};
use nom::multi::separated_list1;
use nom::sequence::{delimited, pair, preceded};
use nom::{IResult, Parser};
use sheaf_types::Color;
use thiserror::Error;

/// Size used when nothing in the cascade sets `font-size`, and the base for `rem`.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Errors that can occur during style parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleParseError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value for '{property}': {value}")]
    InvalidValue { property: String, value: String },

    #[error("Float parse error: {0}")]
    FloatParse(String),
}

impl StyleParseError {
    pub(crate) fn invalid(property: &str, value: &str) -> Self {
        StyleParseError::InvalidValue {
            property: property.to_string(),
            value: value.to_string(),
        }
    }
}

// --- Helper Parsers ---

fn parse_f32(input: &str) -> IResult<&str, f32> {
    map_res(
        recognize((
            opt(alt((char('+'), char('-')))),
            alt((
                recognize((digit1, opt((char('.'), digit1)))),
                recognize((char('.'), digit1)),
            )),
        )),
        |s: &str| s.parse::<f32>(),
    )
    .parse(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0).parse(input)
}

// --- Unit & Dimension Parsers ---

fn parse_unit(input: &str) -> IResult<&str, f32> {
    alt((
        value(1.0, tag_no_case("pt")),
        value(0.75, tag_no_case("px")),
        value(72.0, tag_no_case("in")),
        value(28.35, tag_no_case("cm")),
        value(2.835, tag_no_case("mm")),
        value(12.0, tag_no_case("pc")),
    ))
    .parse(input)
}

/// Parses an absolute length value with optional unit (e.g., "12pt", "1in", "10mm").
/// A bare number is taken as points.
pub fn parse_length(input: &str) -> IResult<&str, f32> {
    let (input, number) = parse_f32(input)?;
    let (input, multiplier) = opt(parse_unit).parse(input)?;
    Ok((input, number * multiplier.unwrap_or(1.0)))
}

fn relative_unit(input: &str) -> IResult<&str, &str> {
    alt((tag_no_case("rem"), tag_no_case("em"), tag_no_case("ex"), tag("%"))).parse(input)
}

/// Parses a length that may be relative to the current font size (`em`, `ex`, `%`)
/// or to the default font size (`rem`).
pub fn parse_length_in_context(input: &str, font_size: f32) -> IResult<&str, f32> {
    let (rest, number) = parse_f32(input)?;
    match relative_unit(rest) {
        Ok((rest, unit)) => {
            let factor = match unit.to_ascii_lowercase().as_str() {
                "rem" => DEFAULT_FONT_SIZE,
                "em" => font_size,
                "ex" => font_size / 2.0,
                _ => font_size / 100.0,
            };
            Ok((rest, number * factor))
        }
        Err(_) => {
            let (rest, multiplier) = opt(parse_unit).parse(rest)?;
            Ok((rest, number * multiplier.unwrap_or(1.0)))
        }
    }
}

/// Parses a dimension value (length, percentage, or "auto").
pub fn parse_dimension(input: &str) -> IResult<&str, Dimension> {
    alt((
        map(tag_no_case("auto"), |_| Dimension::Auto),
        map(pair(parse_f32, char('%')), |(val, _)| Dimension::Percent(val)),
        map(parse_length, Dimension::Pt),
    ))
    .parse(input)
}

fn margin_edge(input: &str) -> IResult<&str, f32> {
    alt((map(tag_no_case("auto"), |_| 0.0), parse_length)).parse(input)
}

/// Parses CSS shorthand margins (1 to 4 values, clockwise from the top).
pub fn parse_shorthand_margins(input: &str) -> IResult<&str, Margins> {
    let (rest, parts) = separated_list1(space1, margin_edge).parse(input)?;
    let margins = match parts.as_slice() {
        [all] => Margins::all(*all),
        [y, x] => Margins { top: *y, right: *x, bottom: *y, left: *x },
        [top, x, bottom] => Margins { top: *top, right: *x, bottom: *bottom, left: *x },
        [top, right, bottom, left, ..] => Margins {
            top: *top,
            right: *right,
            bottom: *bottom,
            left: *left,
        },
        [] => Margins::default(),
    };
    if parts.len() > 4 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Count,
        )));
    }
    Ok((rest, margins))
}

// --- Color Parsers ---

fn from_hex(input: &str) -> Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(input, 16)
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_primary(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, is_hex_digit), from_hex).parse(input)
}

fn hex_color_6(input: &str) -> IResult<&str, Color> {
    map((hex_primary, hex_primary, hex_primary), |(r, g, b)| Color::rgb(r, g, b)).parse(input)
}

fn hex_color_3(input: &str) -> IResult<&str, Color> {
    map_res(take_while_m_n(3, 3, is_hex_digit), |digits: &str| {
        Color::from_hex(&format!("#{}", digits))
    })
    .parse(input)
}

fn hex_color(input: &str) -> IResult<&str, Color> {
    preceded(char('#'), alt((hex_color_6, hex_color_3))).parse(input)
}

fn percent_sign(input: &str) -> IResult<&str, Option<char>> {
    opt(char('%')).parse(input)
}

fn rgb_component(input: &str) -> IResult<&str, u8> {
    let (input, number) = delimited(space0, parse_f32, space0).parse(input)?;
    let (input, percent) = percent_sign(input)?;
    let scaled = if percent.is_some() { number * 2.55 } else { number };
    Ok((input, scaled.round().clamp(0.0, 255.0) as u8))
}

fn alpha_component(input: &str) -> IResult<&str, f32> {
    let (input, number) = delimited(space0, parse_f32, space0).parse(input)?;
    let (input, percent) = percent_sign(input)?;
    let alpha = if percent.is_some() { number / 100.0 } else { number };
    Ok((input, alpha.clamp(0.0, 1.0)))
}

fn rgb_open(input: &str) -> IResult<&str, &str> {
    alt((tag_no_case("rgba("), tag_no_case("rgb("))).parse(input)
}

fn close_paren(input: &str) -> IResult<&str, char> {
    preceded(space0, char(')')).parse(input)
}

fn rgb_function(input: &str) -> IResult<&str, Color> {
    let (input, _) = rgb_open(input)?;
    let (input, r) = rgb_component(input)?;
    let (input, _) = comma(input)?;
    let (input, g) = rgb_component(input)?;
    let (input, _) = comma(input)?;
    let (input, b) = rgb_component(input)?;
    let (input, a) = opt(preceded(comma, alpha_component)).parse(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, Color { r, g, b, a: a.unwrap_or(1.0) }))
}

fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(
        char('-'),
        take_while_m_n(1, 32, |c: char| c.is_ascii_alphabetic()),
    ))
    .parse(input)
}

fn named_color(input: &str) -> IResult<&str, Color> {
    let (rest, word) = keyword(input)?;
    if word.eq_ignore_ascii_case("transparent") {
        return Ok((rest, Color { r: 0, g: 0, b: 0, a: 0.0 }));
    }
    match Color::named(word) {
        Some(color) => Ok((rest, color)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Parses a color: `#rgb`, `#rrggbb`, `rgb()`/`rgba()`, a named color, or `transparent`.
pub fn parse_color(input: &str) -> IResult<&str, Color> {
    alt((hex_color, rgb_function, named_color)).parse(input)
}

// --- Page Parsers ---

fn orientation(input: &str) -> IResult<&str, bool> {
    alt((
        value(true, tag_no_case("landscape")),
        value(false, tag_no_case("portrait")),
    ))
    .parse(input)
}

fn paper_name(input: &str) -> IResult<&str, &str> {
    take_while_m_n(1, 16, |c: char| c.is_ascii_alphanumeric()).parse(input)
}

fn named_page_size(input: &str) -> IResult<&str, PageSize> {
    let (rest, name) = paper_name(input)?;
    match PageSize::named(name) {
        Some(size) => Ok((rest, size)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn explicit_page_size(input: &str) -> IResult<&str, PageSize> {
    let (input, width) = parse_length(input)?;
    let (input, height) = opt(preceded(space1, parse_length)).parse(input)?;
    Ok((input, PageSize::Custom { width, height: height.unwrap_or(width) }))
}

/// Parses an `@page` `size` value: `A4`, `letter landscape`, `landscape`, `210mm 297mm`.
pub fn parse_page_size(input: &str) -> IResult<&str, PageSize> {
    let oriented = |size: PageSize, landscape: Option<bool>| match landscape {
        Some(true) => size.landscape(),
        _ => size,
    };
    alt((
        map(
            pair(named_page_size, opt(preceded(space1, orientation))),
            move |(size, landscape)| oriented(size, landscape),
        ),
        map(orientation, move |landscape| oriented(PageSize::default(), Some(landscape))),
        explicit_page_size,
    ))
    .parse(input)
}

/// Helper to run a nom parser and convert its result to a `Result<T, StyleParseError>`.
pub fn run_parser<'a, T, F>(parser: F, input: &'a str) -> Result<T, StyleParseError>
where
    F: Fn(&'a str) -> IResult<&'a str, T>,
{
    match parser(input.trim()) {
        Ok(("", result)) => Ok(result),
        Ok((rem, _)) => Err(StyleParseError::Parse(format!(
            "Parser did not consume all input. Remainder: '{}'",
            rem
        ))),
        Err(e) => Err(StyleParseError::Parse(e.to_string())),
    }
}

// --- High-level Parse Functions ---

/// Parses a font weight, resolving `bolder`/`lighter` against the parent weight.
pub fn parse_font_weight(s: &str, parent: &FontWeight) -> Result<FontWeight, StyleParseError> {
    let lowered = s.trim().to_lowercase();
    if let Some(weight) = FontWeight::relative_to(&lowered, parent) {
        return Ok(weight);
    }
    FontWeight::parse(&lowered).map_err(|_| StyleParseError::invalid("font-weight", s))
}

/// Parses a font style string (e.g., "normal", "italic").
pub fn parse_font_style(s: &str) -> Result<FontStyle, StyleParseError> {
    FontStyle::parse(s).map_err(|_| StyleParseError::invalid("font-style", s))
}

/// Parses a `font-size` value to points. Keywords, relative units and
/// percentages resolve against `parent_size`.
pub fn parse_font_size(s: &str, parent_size: f32) -> Result<f32, StyleParseError> {
    let size = match s.trim().to_lowercase().as_str() {
        "xx-small" => 7.0,
        "x-small" => 7.5,
        "small" => 10.0,
        "medium" => DEFAULT_FONT_SIZE,
        "large" => 13.5,
        "x-large" => 18.0,
        "xx-large" => 24.0,
        "smaller" => parent_size / 1.2,
        "larger" => parent_size * 1.2,
        _ => run_parser(|i| parse_length_in_context(i, parent_size), s)
            .map_err(|_| StyleParseError::invalid("font-size", s))?,
    };
    if size < 0.0 {
        return Err(StyleParseError::invalid("font-size", s));
    }
    Ok(size)
}

/// Splits a `font-family` list into unquoted family names, in preference order.
pub fn parse_font_family_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|family| family.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|family| !family.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a text-align value.
pub fn parse_text_align(s: &str) -> Result<TextAlign, StyleParseError> {
    TextAlign::parse(s).ok_or_else(|| StyleParseError::invalid("text-align", s))
}

/// Parses a `line-height` value to points. Unitless numbers multiply the font size.
pub fn parse_line_height(s: &str, font_size: f32) -> Result<f32, StyleParseError> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("normal") {
        return Ok(font_size * 1.2);
    }
    if let Ok(factor) = trimmed.parse::<f32>() {
        return Ok(font_size * factor);
    }
    run_parser(|i| parse_length_in_context(i, font_size), trimmed)
        .map_err(|_| StyleParseError::invalid("line-height", s))
}
