//! Expansion of shorthand properties into longhands.

use sheaf_style::parsers::{parse_color, parse_font_size, parse_length, run_parser, DEFAULT_FONT_SIZE};
use sheaf_style::{FontWeight, ListStylePosition, ListStyleType, StyleParseError};

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

const BORDER_STYLES: &[&str] = &[
    "none", "hidden", "dotted", "dashed", "solid", "double", "groove", "ridge", "inset", "outset",
];

type Longhands = Vec<(String, String)>;

fn invalid(property: &str, value: &str) -> StyleParseError {
    StyleParseError::InvalidValue {
        property: property.to_string(),
        value: value.to_string(),
    }
}

/// Expands `property: value` into longhand declarations. Properties that are
/// not shorthands come back unchanged as a single pair.
pub fn expand(property: &str, value: &str) -> Result<Longhands, StyleParseError> {
    let value = value.trim();
    let longhands = match property {
        "margin" | "padding" => box_sides(property, value, |side| format!("{}-{}", property, side))?,
        "border-width" | "border-style" | "border-color" => {
            let suffix = &property["border-".len()..];
            box_sides(property, value, |side| format!("border-{}-{}", side, suffix))?
        }
        "border" => {
            let mut all = Vec::new();
            for side in SIDES {
                all.extend(border(property, &format!("border-{}", side), value)?);
            }
            all
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => border(property, property, value)?,
        "font" => font(value)?,
        "list-style" => list_style(value)?,
        "background" => background(value)?,
        _ => vec![(property.to_string(), value.to_string())],
    };
    Ok(longhands)
}

/// The CSS 1-to-4 value box expansion: top, right, bottom, left.
fn box_sides(
    property: &str,
    value: &str,
    name: impl Fn(&str) -> String,
) -> Result<Longhands, StyleParseError> {
    let values: Vec<&str> = value.split_whitespace().collect();
    let [top, right, bottom, left] = match values.as_slice() {
        [all] => [*all; 4],
        [vertical, horizontal] => [*vertical, *horizontal, *vertical, *horizontal],
        [top, horizontal, bottom] => [*top, *horizontal, *bottom, *horizontal],
        [top, right, bottom, left] => [*top, *right, *bottom, *left],
        _ => return Err(invalid(property, value)),
    };
    Ok(SIDES
        .iter()
        .zip([top, right, bottom, left])
        .map(|(side, v)| (name(side), v.to_string()))
        .collect())
}

fn border(property: &str, prefix: &str, value: &str) -> Result<Longhands, StyleParseError> {
    if value.eq_ignore_ascii_case("inherit") {
        return Ok(["width", "style", "color"]
            .iter()
            .map(|part| (format!("{}-{}", prefix, part), "inherit".to_string()))
            .collect());
    }
    let mut width = None;
    let mut style = None;
    let mut color = None;
    for token in value.split_whitespace() {
        let lowered = token.to_ascii_lowercase();
        if style.is_none() && BORDER_STYLES.contains(&lowered.as_str()) {
            style = Some(lowered);
        } else if width.is_none()
            && (matches!(lowered.as_str(), "thin" | "medium" | "thick") || run_parser(parse_length, token).is_ok())
        {
            width = Some(token.to_string());
        } else if color.is_none() && run_parser(parse_color, token).is_ok() {
            color = Some(token.to_string());
        } else {
            return Err(invalid(property, value));
        }
    }
    let mut longhands = vec![
        (format!("{}-width", prefix), width.unwrap_or_else(|| "medium".to_string())),
        (format!("{}-style", prefix), style.unwrap_or_else(|| "none".to_string())),
    ];
    if let Some(color) = color {
        longhands.push((format!("{}-color", prefix), color));
    }
    Ok(longhands)
}

/// Byte spans of the whitespace-separated words in `s`.
fn word_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(begin)) => {
                spans.push((begin, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(begin) = start {
        spans.push((begin, s.len()));
    }
    spans
}

/// `font: [style] [variant] [weight] size[/line-height] family`
fn font(value: &str) -> Result<Longhands, StyleParseError> {
    if value.eq_ignore_ascii_case("inherit") {
        return Ok(["font-style", "font-variant", "font-weight", "font-size", "line-height", "font-family"]
            .iter()
            .map(|p| (p.to_string(), "inherit".to_string()))
            .collect());
    }
    let spans = word_spans(value);
    let mut style = "normal".to_string();
    let mut variant = "normal".to_string();
    let mut weight = "normal".to_string();
    let mut index = 0;

    let size_text = loop {
        let Some(&(start, end)) = spans.get(index) else {
            return Err(invalid("font", value));
        };
        let word = &value[start..end];
        let lowered = word.to_ascii_lowercase();
        index += 1;
        match lowered.as_str() {
            "normal" => {}
            "italic" | "oblique" => style = lowered,
            "small-caps" => variant = lowered,
            "bold" | "bolder" | "lighter" => weight = lowered,
            _ if FontWeight::parse(&lowered).is_ok() && lowered.parse::<u16>().is_ok() => weight = lowered,
            _ => break word,
        }
    };

    let (size, mut line_height) = match size_text.split_once('/') {
        Some((size, line_height)) => (size, Some(line_height.to_string())),
        None => (size_text, None),
    };
    parse_font_size(size, DEFAULT_FONT_SIZE).map_err(|_| invalid("font", value))?;

    // `12pt / 1.5` and `12pt /1.5` spread the line height over more words.
    if line_height.as_deref() == Some("") || line_height.is_none() {
        if let Some(&(start, end)) = spans.get(index) {
            let word = &value[start..end];
            if word == "/" {
                let &(lh_start, lh_end) = spans.get(index + 1).ok_or_else(|| invalid("font", value))?;
                line_height = Some(value[lh_start..lh_end].to_string());
                index += 2;
            } else if let Some(rest) = word.strip_prefix('/') {
                line_height = Some(rest.to_string());
                index += 1;
            }
        }
    }
    if line_height.as_deref() == Some("") {
        return Err(invalid("font", value));
    }

    let family = match spans.get(index) {
        Some(&(start, _)) => value[start..].trim(),
        None => return Err(invalid("font", value)),
    };

    Ok(vec![
        ("font-style".to_string(), style),
        ("font-variant".to_string(), variant),
        ("font-weight".to_string(), weight),
        ("font-size".to_string(), size.to_string()),
        ("line-height".to_string(), line_height.unwrap_or_else(|| "normal".to_string())),
        ("font-family".to_string(), family.to_string()),
    ])
}

fn list_style(value: &str) -> Result<Longhands, StyleParseError> {
    let mut style_type = None;
    let mut position = None;
    let mut image = None;
    for token in value.split_whitespace() {
        let lowered = token.to_ascii_lowercase();
        if lowered.starts_with("url(") {
            image = Some(token.to_string());
        } else if lowered == "none" && style_type.is_some() {
            image = Some(lowered);
        } else if style_type.is_none() && ListStyleType::parse(&lowered).is_some() {
            style_type = Some(lowered);
        } else if position.is_none() && ListStylePosition::parse(&lowered).is_some() {
            position = Some(lowered);
        } else {
            return Err(invalid("list-style", value));
        }
    }
    Ok(vec![
        ("list-style-type".to_string(), style_type.unwrap_or_else(|| "disc".to_string())),
        ("list-style-position".to_string(), position.unwrap_or_else(|| "outside".to_string())),
        ("list-style-image".to_string(), image.unwrap_or_else(|| "none".to_string())),
    ])
}

/// Only the color layer of `background` is kept.
fn background(value: &str) -> Result<Longhands, StyleParseError> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(vec![("background-color".to_string(), "transparent".to_string())]);
    }
    let color = value
        .split_whitespace()
        .find(|token| run_parser(parse_color, token).is_ok());
    match color {
        Some(color) => Ok(vec![("background-color".to_string(), color.to_string())]),
        None => {
            log::debug!("background '{}' has no color layer; ignored", value);
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(longhands: &Longhands) -> Vec<(&str, &str)> {
        longhands.iter().map(|(p, v)| (p.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_margin_expansion() {
        let expanded = expand("margin", "1pt 2pt 3pt").unwrap();
        assert_eq!(
            pairs(&expanded),
            vec![("margin-top", "1pt"), ("margin-right", "2pt"), ("margin-bottom", "3pt"), ("margin-left", "2pt")]
        );
        assert!(expand("padding", "1 2 3 4 5").is_err());
    }

    #[test]
    fn test_font_expansion() {
        let expanded = expand("font", "italic bold 12pt/1.5 \"Times New Roman\", serif").unwrap();
        assert_eq!(
            pairs(&expanded),
            vec![
                ("font-style", "italic"),
                ("font-variant", "normal"),
                ("font-weight", "bold"),
                ("font-size", "12pt"),
                ("line-height", "1.5"),
                ("font-family", "\"Times New Roman\", serif"),
            ]
        );

        let spaced = expand("font", "600 10px / 14px Arial").unwrap();
        assert_eq!(spaced[2].1, "600");
        assert_eq!(spaced[4].1, "14px");
        assert_eq!(spaced[5].1, "Arial");

        assert!(expand("font", "bold 12pt").is_err());
        assert!(expand("font", "caption").is_err());
    }

    #[test]
    fn test_border_expansion() {
        let expanded = expand("border-bottom", "1px solid #333").unwrap();
        assert_eq!(
            pairs(&expanded),
            vec![("border-bottom-width", "1px"), ("border-bottom-style", "solid"), ("border-bottom-color", "#333")]
        );
        assert_eq!(expand("border", "thin dashed").unwrap().len(), 8);
        assert!(expand("border", "1px solid wobbly").is_err());
    }

    #[test]
    fn test_list_style_and_background() {
        let expanded = expand("list-style", "square inside").unwrap();
        assert_eq!(expanded[0].1, "square");
        assert_eq!(expanded[1].1, "inside");

        assert_eq!(
            pairs(&expand("background", "url(x.png) #fafafa no-repeat").unwrap()),
            vec![("background-color", "#fafafa")]
        );
        assert!(expand("background", "url(x.png)").unwrap().is_empty());
    }

    #[test]
    fn test_non_shorthand_passes_through() {
        assert_eq!(pairs(&expand("color", " red ").unwrap()), vec![("color", "red")]);
    }
}
