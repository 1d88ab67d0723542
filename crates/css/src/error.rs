use sheaf_style::StyleParseError;
use sheaf_traits::ResourceError;
use sheaf_types::Diagnostic;
use thiserror::Error;

/// A recoverable problem in a stylesheet. The offending selector, declaration
/// or at-rule is dropped and parsing continues.
#[derive(Error, Debug)]
pub enum CssError {
    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Invalid declaration '{declaration}': {source}")]
    Declaration {
        declaration: String,
        #[source]
        source: StyleParseError,
    },

    #[error("Malformed declaration '{0}'")]
    MalformedDeclaration(String),

    #[error("Unbalanced braces near '{0}'")]
    Unbalanced(String),

    #[error("Could not import '{href}': {source}")]
    Import {
        href: String,
        #[source]
        source: ResourceError,
    },

    #[error("Unsupported at-rule @{0} skipped")]
    UnsupportedAtRule(String),
}

impl CssError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CssError::Import { .. } => Diagnostic::resource(self.to_string()),
            CssError::UnsupportedAtRule(_) => Diagnostic::unsupported(self.to_string()),
            _ => Diagnostic::style(self.to_string()),
        }
    }
}
