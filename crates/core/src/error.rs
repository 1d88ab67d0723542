//! Defines the unified error type for a conversion run.

use sheaf_markup::MarkupError;
use sheaf_traits::{FontError, ResourceError, WriterError};
use thiserror::Error;

/// Anything that aborts a run. Recoverable problems never show up here; they
/// are collected as diagnostics instead.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Input could not be decoded: {0}")]
    Markup(#[from] MarkupError),
    #[error("Output writer failed: {0}")]
    Writer(#[from] WriterError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
    #[error("Font error: {0}")]
    Font(#[from] FontError),
    #[error("Pipeline state error: {0}")]
    State(String),
}
