//! Defines enums for CSS List properties.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
#[derive(Default)]
pub enum ListStyleType {
    #[default]
    Disc,
    Circle,
    Square,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
    None,
}

impl ListStyleType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "disc" => Some(ListStyleType::Disc),
            "circle" => Some(ListStyleType::Circle),
            "square" => Some(ListStyleType::Square),
            "decimal" => Some(ListStyleType::Decimal),
            "lower-alpha" | "lower-latin" => Some(ListStyleType::LowerAlpha),
            "upper-alpha" | "upper-latin" => Some(ListStyleType::UpperAlpha),
            "lower-roman" => Some(ListStyleType::LowerRoman),
            "upper-roman" => Some(ListStyleType::UpperRoman),
            "none" => Some(ListStyleType::None),
            _ => None,
        }
    }

    /// The marker text for the item at 1-based position `ordinal`.
    pub fn marker(&self, ordinal: usize) -> String {
        match self {
            ListStyleType::Disc => "\u{2022}".to_string(),
            ListStyleType::Circle => "o".to_string(),
            ListStyleType::Square => "\u{25aa}".to_string(),
            ListStyleType::Decimal => format!("{}.", ordinal),
            ListStyleType::LowerAlpha => format!("{}.", alpha(ordinal)),
            ListStyleType::UpperAlpha => format!("{}.", alpha(ordinal).to_uppercase()),
            ListStyleType::LowerRoman => format!("{}.", roman(ordinal).to_lowercase()),
            ListStyleType::UpperRoman => format!("{}.", roman(ordinal)),
            ListStyleType::None => String::new(),
        }
    }
}

fn alpha(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    out.iter().rev().collect()
}

fn roman(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
#[derive(Default)]
pub enum ListStylePosition {
    Inside,
    #[default]
    Outside,
}

impl ListStylePosition {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inside" => Some(ListStylePosition::Inside),
            "outside" => Some(ListStylePosition::Outside),
            _ => None,
        }
    }
}
