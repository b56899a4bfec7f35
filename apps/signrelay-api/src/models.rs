//! Data models for the signing relay API

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Uploaded,
    Converted,
    Signed,
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentState::Uploaded => write!(f, "uploaded"),
            DocumentState::Converted => write!(f, "converted"),
            DocumentState::Signed => write!(f, "signed"),
        }
    }
}

/// A document in the store, keyed by its identifier stem
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    /// Original extension without the dot, if the upload had one
    pub extension: Option<String>,
    #[serde(skip)]
    pub source_path: PathBuf,
    pub state: DocumentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response from POST /upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(rename = "shareLink")]
    pub share_link: String,
}

/// Body of POST /sign/:fileId
///
/// Both fields are optional at the serde level so a missing field is
/// reported with a specific message rather than a generic rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(default)]
    pub signer_name: Option<String>,
    #[serde(default)]
    pub signature_image: Option<String>,
}

/// Response from POST /sign/:fileId
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}
