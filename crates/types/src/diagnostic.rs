//! Recoverable problems noticed during a conversion.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// Malformed markup that was repaired or skipped.
    Markup,
    /// A stylesheet rule or declaration that was dropped.
    Style,
    /// A stylesheet, image or font that could not be loaded.
    Resource,
    /// A construct the converter does not handle; treated as a no-op.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn markup(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Markup, message)
    }

    pub fn style(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Style, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Resource, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Unsupported, message)
    }

    /// Emits the diagnostic through the `log` facade: unsupported constructs at
    /// debug level, everything else as a warning.
    pub fn log(&self) {
        match self.kind {
            DiagnosticKind::Unsupported => log::debug!("{}", self),
            _ => log::warn!("{}", self),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DiagnosticKind::Markup => "markup",
            DiagnosticKind::Style => "style",
            DiagnosticKind::Resource => "resource",
            DiagnosticKind::Unsupported => "unsupported",
        };
        write!(f, "[{}] {}", kind, self.message)
    }
}
