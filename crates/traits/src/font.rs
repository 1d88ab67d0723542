//! FontProvider trait for abstracting font loading and discovery.
//!
//! The font catalog is built once before any conversion runs and then shared
//! read-only, so providers only need interior locking for population.

use sheaf_style::{FontStyle, FontWeight};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Error type for font loading operations.
#[derive(Error, Debug, Clone)]
pub enum FontError {
    #[error("Font not found: {family} (weight: {weight:?}, style: {style:?})")]
    NotFound {
        family: String,
        weight: FontWeight,
        style: FontStyle,
    },

    #[error("Failed to load font '{path}': {message}")]
    LoadFailed { path: String, message: String },
}

/// Shared font data type (reference-counted bytes).
pub type SharedFontData = Arc<Vec<u8>>;

/// Descriptor for a font face available in a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    /// PostScript name if available
    pub postscript_name: Option<String>,
}

/// A query for finding a font.
#[derive(Debug, Clone)]
pub struct FontQuery<'a> {
    /// Primary family name to search for
    pub family: &'a str,
    /// Fallback families to try if primary is not found
    pub fallbacks: &'a [&'a str],
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl<'a> FontQuery<'a> {
    pub fn new(family: &'a str) -> Self {
        Self {
            family,
            fallbacks: &[],
            weight: FontWeight::Regular,
            style: FontStyle::Normal,
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: &'a [&'a str]) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    fn families(&self) -> impl Iterator<Item = &'a str> + '_ {
        std::iter::once(self.family).chain(self.fallbacks.iter().copied())
    }
}

/// A trait for loading and discovering fonts.
pub trait FontProvider: Send + Sync + Debug {
    /// Finds the best face for the query and returns its descriptor with its bytes.
    fn match_font(&self, query: &FontQuery<'_>) -> Result<(FontDescriptor, SharedFontData), FontError>;

    /// Load a font matching the given query.
    fn load_font(&self, query: &FontQuery<'_>) -> Result<SharedFontData, FontError> {
        self.match_font(query).map(|(_, data)| data)
    }

    /// A list of unique font family names available in this provider.
    fn list_families(&self) -> Vec<String>;

    /// Returns a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// An in-memory font provider.
///
/// Fonts are stored in memory and must be pre-populated before use.
#[derive(Debug, Default)]
pub struct InMemoryFontProvider {
    fonts: std::sync::RwLock<Vec<(FontDescriptor, SharedFontData)>>,
}

impl InMemoryFontProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a font to the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `FontError::LoadFailed` if the internal lock is poisoned.
    pub fn add_font(
        &self,
        family: impl Into<String>,
        weight: FontWeight,
        style: FontStyle,
        data: Vec<u8>,
    ) -> Result<(), FontError> {
        let descriptor = FontDescriptor {
            family: family.into(),
            weight,
            style,
            postscript_name: None,
        };
        self.add_font_with_descriptor(descriptor, Arc::new(data))
    }

    /// Add a font with a full descriptor.
    pub fn add_font_with_descriptor(
        &self,
        descriptor: FontDescriptor,
        data: SharedFontData,
    ) -> Result<(), FontError> {
        let path = format!(
            "{}:{}:{:?}",
            descriptor.family,
            descriptor.weight.numeric_value(),
            descriptor.style
        );
        let mut fonts = self.fonts.write().map_err(|_| FontError::LoadFailed {
            path,
            message: "font store lock poisoned".to_string(),
        })?;
        fonts.push((descriptor, data));
        Ok(())
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.fonts.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_in_family(
        fonts: &[(FontDescriptor, SharedFontData)],
        family: &str,
        weight: &FontWeight,
        style: &FontStyle,
    ) -> Option<(FontDescriptor, SharedFontData)> {
        let target_weight = weight.numeric_value() as i32;
        let in_family = || fonts.iter().filter(|(d, _)| d.family.eq_ignore_ascii_case(family));

        // Same style, closest weight; then any style, closest weight.
        in_family()
            .filter(|(d, _)| &d.style == style)
            .min_by_key(|(d, _)| (d.weight.numeric_value() as i32 - target_weight).abs())
            .or_else(|| {
                in_family().min_by_key(|(d, _)| {
                    (d.weight.numeric_value() as i32 - target_weight).abs()
                })
            })
            .cloned()
    }
}

impl FontProvider for InMemoryFontProvider {
    fn match_font(&self, query: &FontQuery<'_>) -> Result<(FontDescriptor, SharedFontData), FontError> {
        let not_found = || FontError::NotFound {
            family: query.family.to_string(),
            weight: query.weight.clone(),
            style: query.style.clone(),
        };
        let fonts = self.fonts.read().map_err(|_| not_found())?;
        query
            .families()
            .find_map(|family| Self::find_in_family(&fonts, family, &query.weight, &query.style))
            .ok_or_else(not_found)
    }

    fn list_families(&self) -> Vec<String> {
        let Ok(fonts) = self.fonts.read() else {
            return Vec::new();
        };
        let mut families: Vec<_> = fonts.iter().map(|(d, _)| d.family.clone()).collect();
        families.sort();
        families.dedup();
        families
    }

    fn name(&self) -> &'static str {
        "InMemoryFontProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with(faces: &[(&str, FontWeight, FontStyle, &str)]) -> InMemoryFontProvider {
        let provider = InMemoryFontProvider::new();
        for (family, weight, style, bytes) in faces {
            provider
                .add_font(*family, weight.clone(), style.clone(), bytes.as_bytes().to_vec())
                .unwrap();
        }
        provider
    }

    #[test]
    fn test_weight_and_style_matching() {
        let provider = provider_with(&[
            ("Body", FontWeight::Regular, FontStyle::Normal, "regular"),
            ("Body", FontWeight::Bold, FontStyle::Normal, "bold"),
            ("Body", FontWeight::Regular, FontStyle::Italic, "italic"),
        ]);

        let bold = provider.load_font(&FontQuery::new("body").with_weight(FontWeight::Bold)).unwrap();
        assert_eq!(&*bold, b"bold");

        // Medium (500) is closer to Regular (400) than Bold (700)
        let medium = provider.load_font(&FontQuery::new("Body").with_weight(FontWeight::Medium)).unwrap();
        assert_eq!(&*medium, b"regular");

        let italic = provider.load_font(&FontQuery::new("Body").with_style(FontStyle::Italic)).unwrap();
        assert_eq!(&*italic, b"italic");

        // No oblique face: falls back to the closest weight in any style.
        let (descriptor, _) = provider
            .match_font(&FontQuery::new("Body").with_style(FontStyle::Oblique))
            .unwrap();
        assert_eq!(descriptor.weight, FontWeight::Regular);
    }

    #[test]
    fn test_fallback_families_in_order() {
        let provider = provider_with(&[("Second", FontWeight::Regular, FontStyle::Normal, "second")]);
        let query = FontQuery::new("First").with_fallbacks(&["Missing", "Second"]);
        assert_eq!(&*provider.load_font(&query).unwrap(), b"second");
        assert!(matches!(
            provider.match_font(&FontQuery::new("Missing")),
            Err(FontError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_families_is_deduplicated() {
        let provider = provider_with(&[
            ("Serif", FontWeight::Regular, FontStyle::Normal, "a"),
            ("Serif", FontWeight::Bold, FontStyle::Normal, "b"),
            ("Mono", FontWeight::Regular, FontStyle::Normal, "c"),
        ]);
        assert_eq!(provider.list_families(), vec!["Mono", "Serif"]);
    }
}
