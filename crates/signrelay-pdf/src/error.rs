use thiserror::Error;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF has no pages")]
    NoPages,

    #[error("Font error: {0}")]
    FontError(String),

    #[error("Invalid signature image: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}

impl From<lopdf::Error> for StampError {
    fn from(err: lopdf::Error) -> Self {
        StampError::OperationError(err.to_string())
    }
}
