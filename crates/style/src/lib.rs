//! Typed style values, CSS value parsers and the per-element `StyleMap`.

pub mod dimension;
pub mod display;
pub mod font;
pub mod list;
pub mod parsers;
pub mod properties;
pub mod style_map;
pub mod text;

pub use dimension::{Dimension, Margins, PageSize};
pub use display::Display;
pub use font::{FontStyle, FontWeight};
pub use list::{ListStylePosition, ListStyleType};
pub use parsers::StyleParseError;
pub use style_map::StyleMap;
pub use text::{TextAlign, TextDecoration};
