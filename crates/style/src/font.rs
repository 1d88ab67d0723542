use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[derive(Default)]
pub enum FontWeight {
    Thin,
    Light,
    #[default]
    Regular,
    Medium,
    Bold,
    Black,
    Numeric(u16),
}

impl FontWeight {
    /// Returns the numeric weight value (100-900 scale).
    ///
    /// Standard CSS font-weight values:
    /// - Thin: 100
    /// - Light: 300
    /// - Regular: 400
    /// - Medium: 500
    /// - Bold: 700
    /// - Black: 900
    pub fn numeric_value(&self) -> u16 {
        match self {
            FontWeight::Thin => 100,
            FontWeight::Light => 300,
            FontWeight::Regular => 400,
            FontWeight::Medium => 500,
            FontWeight::Bold => 700,
            FontWeight::Black => 900,
            FontWeight::Numeric(n) => *n,
        }
    }

    /// Whether a face of this weight should be drawn from a bold variant.
    pub fn is_bold(&self) -> bool {
        self.numeric_value() >= 600
    }

    /// Resolves the relative keywords `bolder` and `lighter` against the parent weight.
    pub fn relative_to(keyword: &str, parent: &FontWeight) -> Option<FontWeight> {
        let base = parent.numeric_value();
        match keyword {
            "bolder" => Some(if base < 600 { FontWeight::Bold } else { FontWeight::Black }),
            "lighter" => Some(if base > 500 { FontWeight::Regular } else { FontWeight::Thin }),
            _ => None,
        }
    }

    /// Parse a font weight from a string (e.g., "bold", "400")
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "thin" => Ok(FontWeight::Thin),
            "light" => Ok(FontWeight::Light),
            "regular" | "normal" => Ok(FontWeight::Regular),
            "medium" => Ok(FontWeight::Medium),
            "bold" => Ok(FontWeight::Bold),
            "black" => Ok(FontWeight::Black),
            other => other
                .parse::<u16>()
                .ok()
                .filter(|n| (1..=1000).contains(n))
                .map(FontWeight::Numeric)
                .ok_or_else(|| format!("Invalid font weight: '{}'", s)),
        }
    }
}

impl<'de> Deserialize<'de> for FontWeight {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum FontWeightDef {
            Str(String),
            Num(u16),
        }

        match FontWeightDef::deserialize(deserializer)? {
            FontWeightDef::Str(s) => Self::parse(&s).map_err(de::Error::custom),
            FontWeightDef::Num(n) => Ok(FontWeight::Numeric(n)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[derive(Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(FontStyle::Normal),
            "italic" => Ok(FontStyle::Italic),
            "oblique" => Ok(FontStyle::Oblique),
            _ => Err(format!("Invalid font style: '{}'", s)),
        }
    }

    pub fn is_slanted(&self) -> bool {
        !matches!(self, FontStyle::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_keywords_and_numbers() {
        assert_eq!(FontWeight::parse("bold").unwrap(), FontWeight::Bold);
        assert_eq!(FontWeight::parse("Normal").unwrap(), FontWeight::Regular);
        assert_eq!(FontWeight::parse("600").unwrap(), FontWeight::Numeric(600));
        assert!(FontWeight::parse("heavy-ish").is_err());
        assert!(FontWeight::parse("0").is_err());
    }

    #[test]
    fn test_is_bold_threshold() {
        assert!(FontWeight::Numeric(600).is_bold());
        assert!(FontWeight::Bold.is_bold());
        assert!(!FontWeight::Medium.is_bold());
    }

    #[test]
    fn test_relative_weights() {
        assert_eq!(FontWeight::relative_to("bolder", &FontWeight::Regular), Some(FontWeight::Bold));
        assert_eq!(FontWeight::relative_to("lighter", &FontWeight::Bold), Some(FontWeight::Regular));
        assert_eq!(FontWeight::relative_to("heavier", &FontWeight::Bold), None);
    }
}
