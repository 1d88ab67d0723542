//! Inline text payloads and the resolved font they are drawn with.

use crate::SharedData;
use sheaf_style::{FontStyle, FontWeight, TextDecoration};
use sheaf_types::Color;

/// A font chosen by font resolution, ready for the writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontHandle {
    /// The family that matched (e.g. "Times" for a `serif` request).
    pub family: String,
    /// Name the output document refers to the face by, e.g. `Helvetica-Bold`.
    pub postscript_name: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    /// Font program bytes; present only when the face is to be embedded.
    pub data: Option<SharedData>,
}

impl FontHandle {
    pub fn is_embedded(&self) -> bool {
        self.data.is_some()
    }
}

/// A run of text sharing one font, size, color and decoration.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: FontHandle,
    pub size: f32,
    pub color: Color,
    pub decoration: TextDecoration,
}

impl TextRun {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
