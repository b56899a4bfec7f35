//! Error types for the signing relay API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file received")]
    MissingFile,

    #[error("Missing signer name")]
    MissingSignerName,

    #[error("Missing signature image")]
    MissingSignature,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An extractor rejection that keeps its own status (e.g. 413)
    #[error("Request rejected: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingFile
            | ApiError::MissingSignerName
            | ApiError::MissingSignature
            | ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Rejected { status, message } => (*status, message.clone()),
            ApiError::DocumentNotFound(_) => {
                (StatusCode::NOT_FOUND, "Document not found".to_string())
            }
            ApiError::ConversionFailed(e) => {
                tracing::error!("Conversion error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Conversion failed".to_string(),
                )
            }
            ApiError::Signing(e) => {
                tracing::error!("Signing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Store(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
