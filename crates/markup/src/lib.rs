//! Tolerant HTML-like markup parsing into a flat, balanced event stream.
//!
//! Input bytes are decoded up front, so a decoding failure surfaces before a
//! single event exists. The resulting events always nest properly: every
//! `ElementStart` is matched by exactly one `ElementEnd`, whatever the input.

pub mod charset;
pub mod entities;
pub mod error;
pub mod event;
pub mod newline;
pub mod parser;
mod tokenizer;

pub use entities::UnknownEntityMode;
pub use error::MarkupError;
pub use event::{Attributes, Event};
pub use newline::{BlockTagPolicy, NeverPolicy, NewLineMode, NewLinePolicy};
pub use parser::{MarkupConfig, MarkupParser, ParseOutput};
