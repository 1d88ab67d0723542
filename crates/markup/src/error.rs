use thiserror::Error;

/// Errors that abort parsing before any event is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error("Input is not valid {encoding}: malformed byte sequence")]
    Decoding { encoding: String },

    #[error("Unknown character set label '{0}'")]
    UnknownCharset(String),
}
