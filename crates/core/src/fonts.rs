//! Font resolution for text runs.
//!
//! The catalog (`FontProvider`) is built once and shared between runs. A
//! `FontResolver` belongs to a single run and memoizes what it resolved, so
//! every run with the same family list, weight and style gets the same handle.
//!
//! Resolution order for each requested family:
//! 1. generic families map to a base family (`serif` -> Times, ...)
//! 2. the catalog is asked for the family
//! 3. the three standard PDF families always resolve without font data
//!
//! When nothing matches, the configured default family is tried the same way,
//! and Helvetica is the last resort.

use crate::config::FontEmbedding;
use sheaf_idf::{FontHandle, SharedData};
use sheaf_style::{FontStyle, FontWeight};
use sheaf_traits::{FontDescriptor, FontProvider, FontQuery};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "system-fonts")]
pub use system::SystemFontProvider;

/// The standard families every PDF reader carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseFamily {
    Helvetica,
    Times,
    Courier,
}

impl BaseFamily {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans-serif" => Some(BaseFamily::Helvetica),
            "times" | "times-roman" | "times new roman" | "serif" => Some(BaseFamily::Times),
            "courier" | "courier new" | "monospace" => Some(BaseFamily::Courier),
            _ => None,
        }
    }

    fn family(&self) -> &'static str {
        match self {
            BaseFamily::Helvetica => "Helvetica",
            BaseFamily::Times => "Times",
            BaseFamily::Courier => "Courier",
        }
    }

    fn postscript_name(&self, bold: bool, slanted: bool) -> &'static str {
        match (self, bold, slanted) {
            (BaseFamily::Helvetica, false, false) => "Helvetica",
            (BaseFamily::Helvetica, true, false) => "Helvetica-Bold",
            (BaseFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (BaseFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (BaseFamily::Times, false, false) => "Times-Roman",
            (BaseFamily::Times, true, false) => "Times-Bold",
            (BaseFamily::Times, false, true) => "Times-Italic",
            (BaseFamily::Times, true, true) => "Times-BoldItalic",
            (BaseFamily::Courier, false, false) => "Courier",
            (BaseFamily::Courier, true, false) => "Courier-Bold",
            (BaseFamily::Courier, false, true) => "Courier-Oblique",
            (BaseFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }
}

/// Maps CSS generic families to the family looked up in the catalog.
fn generic_target(family: &str) -> Option<&'static str> {
    match family.to_ascii_lowercase().as_str() {
        "serif" => Some("Times"),
        "sans-serif" | "system-ui" => Some("Helvetica"),
        "monospace" => Some("Courier"),
        _ => None,
    }
}

/// Reads the PostScript name out of a font program.
pub fn postscript_name(data: &[u8]) -> Option<String> {
    let face = ttf_parser::Face::parse(data, 0).ok()?;
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolveKey {
    families: Vec<String>,
    weight: u16,
    style: FontStyle,
}

#[derive(Debug)]
pub struct FontResolver {
    catalog: Option<Arc<dyn FontProvider>>,
    embedding: FontEmbedding,
    default_family: String,
    memo: RefCell<HashMap<ResolveKey, FontHandle>>,
}

impl FontResolver {
    pub fn new(
        catalog: Option<Arc<dyn FontProvider>>,
        embedding: FontEmbedding,
        default_family: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            embedding,
            default_family: default_family.into(),
            memo: RefCell::new(HashMap::new()),
        }
    }

    /// Resolves the first usable family in `families`. `_size` does not take
    /// part in face selection; it is accepted so callers pass the full request.
    pub fn resolve(
        &self,
        families: &[String],
        weight: &FontWeight,
        style: &FontStyle,
        _size: f32,
    ) -> FontHandle {
        let key = ResolveKey {
            families: families.iter().map(|f| f.to_ascii_lowercase()).collect(),
            weight: weight.numeric_value(),
            style: style.clone(),
        };
        if let Some(handle) = self.memo.borrow().get(&key) {
            return handle.clone();
        }

        let handle = families
            .iter()
            .find_map(|family| self.try_family(family, weight, style))
            .or_else(|| {
                log::debug!(
                    "No font for {:?}; substituting '{}'",
                    families,
                    self.default_family
                );
                self.try_family(&self.default_family, weight, style)
            })
            .unwrap_or_else(|| base_handle(BaseFamily::Helvetica, weight, style));

        self.memo.borrow_mut().insert(key, handle.clone());
        handle
    }

    /// Number of distinct requests resolved so far in this run.
    pub fn resolved_count(&self) -> usize {
        self.memo.borrow().len()
    }

    fn try_family(&self, family: &str, weight: &FontWeight, style: &FontStyle) -> Option<FontHandle> {
        let target = generic_target(family).unwrap_or(family);
        if let Some(catalog) = &self.catalog {
            let query = FontQuery::new(target)
                .with_weight(weight.clone())
                .with_style(style.clone());
            match catalog.match_font(&query) {
                Ok((descriptor, data)) => return Some(self.catalog_handle(descriptor, data)),
                Err(err) => log::debug!("{} has no '{}': {}", catalog.name(), target, err),
            }
        }
        BaseFamily::from_name(target).map(|base| base_handle(base, weight, style))
    }

    fn catalog_handle(&self, descriptor: FontDescriptor, data: SharedData) -> FontHandle {
        let postscript_name = descriptor
            .postscript_name
            .clone()
            .or_else(|| postscript_name(&data))
            .unwrap_or_else(|| descriptor.family.replace(' ', ""));
        FontHandle {
            family: descriptor.family,
            postscript_name,
            weight: descriptor.weight,
            style: descriptor.style,
            data: match self.embedding {
                FontEmbedding::Embed => Some(data),
                FontEmbedding::ReferenceOnly => None,
            },
        }
    }
}

fn base_handle(base: BaseFamily, weight: &FontWeight, style: &FontStyle) -> FontHandle {
    FontHandle {
        family: base.family().to_string(),
        postscript_name: base
            .postscript_name(weight.is_bold(), style.is_slanted())
            .to_string(),
        weight: weight.clone(),
        style: style.clone(),
        data: None,
    }
}

#[cfg(feature = "system-fonts")]
mod system {
    //! A catalog over the fonts installed on this machine.

    use sheaf_style::{FontStyle, FontWeight};
    use sheaf_traits::{FontDescriptor, FontError, FontProvider, FontQuery, SharedFontData};
    use std::sync::Arc;

    pub struct SystemFontProvider {
        db: fontdb::Database,
    }

    impl std::fmt::Debug for SystemFontProvider {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SystemFontProvider")
                .field("faces", &self.db.len())
                .finish()
        }
    }

    impl SystemFontProvider {
        /// Scans the system font directories.
        pub fn load() -> Self {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            log::info!("Loaded {} system font faces", db.len());
            Self { db }
        }

        /// Also scans `dir`.
        pub fn with_font_dir(mut self, dir: impl AsRef<std::path::Path>) -> Self {
            self.db.load_fonts_dir(dir);
            self
        }

        fn descriptor(info: &fontdb::FaceInfo) -> FontDescriptor {
            let family = info
                .families
                .first()
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| info.post_script_name.clone());
            FontDescriptor {
                family,
                weight: map_weight(info.weight),
                style: match info.style {
                    fontdb::Style::Normal => FontStyle::Normal,
                    fontdb::Style::Italic => FontStyle::Italic,
                    fontdb::Style::Oblique => FontStyle::Oblique,
                },
                postscript_name: Some(info.post_script_name.clone()),
            }
        }
    }

    fn map_weight(weight: fontdb::Weight) -> FontWeight {
        match weight {
            fontdb::Weight::THIN => FontWeight::Thin,
            fontdb::Weight::LIGHT => FontWeight::Light,
            fontdb::Weight::NORMAL => FontWeight::Regular,
            fontdb::Weight::MEDIUM => FontWeight::Medium,
            fontdb::Weight::BOLD => FontWeight::Bold,
            fontdb::Weight::BLACK => FontWeight::Black,
            w => FontWeight::Numeric(w.0),
        }
    }

    impl FontProvider for SystemFontProvider {
        fn match_font(
            &self,
            query: &FontQuery<'_>,
        ) -> Result<(FontDescriptor, SharedFontData), FontError> {
            let families: Vec<fontdb::Family<'_>> = std::iter::once(query.family)
                .chain(query.fallbacks.iter().copied())
                .map(fontdb::Family::Name)
                .collect();
            let id = self
                .db
                .query(&fontdb::Query {
                    families: &families,
                    weight: fontdb::Weight(query.weight.numeric_value()),
                    stretch: fontdb::Stretch::Normal,
                    style: match query.style {
                        FontStyle::Normal => fontdb::Style::Normal,
                        FontStyle::Italic => fontdb::Style::Italic,
                        FontStyle::Oblique => fontdb::Style::Oblique,
                    },
                })
                .ok_or_else(|| FontError::NotFound {
                    family: query.family.to_string(),
                    weight: query.weight.clone(),
                    style: query.style.clone(),
                })?;
            let info = self.db.face(id).ok_or_else(|| FontError::LoadFailed {
                path: query.family.to_string(),
                message: "face disappeared from the database".to_string(),
            })?;
            let data = self
                .db
                .with_face_data(id, |data, _index| data.to_vec())
                .ok_or_else(|| FontError::LoadFailed {
                    path: query.family.to_string(),
                    message: "font data could not be read".to_string(),
                })?;
            Ok((Self::descriptor(info), Arc::new(data)))
        }

        fn list_families(&self) -> Vec<String> {
            let mut families: Vec<String> = self
                .db
                .faces()
                .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
                .collect();
            families.sort();
            families.dedup();
            families
        }

        fn name(&self) -> &'static str {
            "SystemFontProvider"
        }
    }
}
