pub mod color;
pub mod diagnostic;

pub use color::Color;
pub use diagnostic::{Diagnostic, DiagnosticKind};
