//! PDF output for sheaf, built on lopdf.
//!
//! [`PdfDocumentWriter`] receives finished blocks, paginates them and writes
//! the document, with its outline, when the conversion ends.

mod error;
mod flow;
mod fonts;
mod images;
mod outline;
mod writer;

pub use error::RenderError;
pub use fonts::to_win_ansi;
pub use writer::PdfDocumentWriter;
