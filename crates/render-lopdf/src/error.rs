use sheaf_traits::WriterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF generation error: {0}")]
    Pdf(String),
    #[error("Image '{src}' could not be decoded: {reason}")]
    Image { src: String, reason: String },
    #[error("Font '{0}' could not be parsed")]
    Font(String),
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

impl From<RenderError> for WriterError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Io(io) => WriterError::Io(io),
            other => WriterError::Render(other.to_string()),
        }
    }
}
