//! HTTP handlers for the signing relay

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};

use crate::error::ApiError;
use crate::models::*;
use crate::pipeline::{self, SigningRequest};
use crate::state::AppState;
use crate::store::extension_of;

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Store the multipart `file` field and hand back its share link
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Upload without a multipart body: {}", e);
        ApiError::MissingFile
    })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let extension = field.file_name().and_then(extension_of);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let record = state.store.put(&bytes, extension.as_deref()).await?;

        tracing::info!(
            "Stored upload {} ({} bytes, extension {:?})",
            record.id,
            bytes.len(),
            record.extension
        );

        return Ok(Json(UploadResponse {
            message: "File received".to_string(),
            share_link: state.signing.share_link(&record.id),
        }));
    }

    Err(ApiError::MissingFile)
}

/// Convert, stamp and mail the document identified by `file_id`
pub async fn sign(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<Json<SignResponse>, ApiError> {
    let Json(req) = body.map_err(|e| match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::Rejected {
            status: e.status(),
            message: e.body_text(),
        },
        _ => ApiError::InvalidRequest(e.body_text()),
    })?;

    let request = SigningRequest::try_from(req)?;

    // Detached from the request future so a client disconnect cannot cancel it
    let task = tokio::spawn(async move {
        pipeline::sign_and_deliver(&state, &file_id, request).await
    });
    let message = task
        .await
        .map_err(|e| ApiError::Signing(format!("signing task failed: {}", e)))??;

    Ok(Json(SignResponse { message }))
}

/// Current state of a stored document
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let record = state
        .store
        .lookup(&file_id)
        .await?
        .ok_or(ApiError::DocumentNotFound(file_id))?;
    Ok(Json(record))
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::Rejected {
        status: e.status(),
        message: e.body_text(),
    }
}
