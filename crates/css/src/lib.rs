//! Stylesheet parsing, selector matching and the cascade.
//!
//! Stylesheets are parsed once into immutable [`Stylesheet`] values and shared
//! behind `Arc` between conversions. [`CssResolver`] folds the matching
//! declarations for one element into a [`sheaf_style::StyleMap`].

pub mod cascade;
pub mod error;
pub mod media;
pub mod selector;
pub mod shorthand;
pub mod stylesheet;
pub mod user_agent;

pub use cascade::CssResolver;
pub use error::CssError;
pub use selector::{Element, Selector, Specificity};
pub use stylesheet::{parse_declarations, parse_stylesheet, Declaration, PageSettings, Rule, Stylesheet, StylesheetParser};
