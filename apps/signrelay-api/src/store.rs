//! Filesystem document store
//!
//! Source documents and their converted artifacts share one directory and
//! one identifier stem: `<id>.<ext>` for the upload, `<id>.pdf` for the
//! artifact. Document state is tracked in an in-memory index; identifiers
//! that are not indexed (files that predate a restart) are found by scanning
//! the directory.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{DocumentRecord, DocumentState};

/// Extensions that mark a stored file as a convertible source document
pub const SOURCE_EXTENSIONS: &[&str] = &["doc", "docx"];

/// Extension of the derived fixed-layout artifact
pub const ARTIFACT_EXTENSION: &str = "pdf";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown document: {0}")]
    UnknownDocument(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` under a fresh identifier
    async fn put(&self, bytes: &[u8], extension: Option<&str>)
        -> Result<DocumentRecord, StoreError>;

    /// Find the source document for `id`
    async fn resolve(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError>;

    /// Find any stored upload for `id`, whatever its extension
    async fn lookup(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError>;

    /// Where the fixed-layout artifact for `id` lives
    fn artifact_path(&self, id: &str) -> PathBuf;

    /// Overwrite the artifact for `id`
    async fn write_artifact(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StoreError>;

    /// Record a state change for an indexed document
    async fn transition(
        &self,
        id: &str,
        state: DocumentState,
    ) -> Result<DocumentRecord, StoreError>;
}

/// Extension of an uploaded filename, if it is a plain alphanumeric suffix
pub fn extension_of(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension().and_then(OsStr::to_str)?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_string())
}

fn is_source_extension(ext: &str) -> bool {
    SOURCE_EXTENSIONS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

pub struct FsDocumentStore {
    root: PathBuf,
    index: RwLock<HashMap<String, DocumentRecord>>,
}

impl FsDocumentStore {
    /// Open the store at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            index: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scan(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let stem = path.file_stem().and_then(OsStr::to_str);
            let ext = path.extension().and_then(OsStr::to_str);

            let (Some(stem), Some(ext)) = (stem, ext) else {
                continue;
            };
            if stem != id || !is_source_extension(ext) {
                continue;
            }

            let modified: DateTime<Utc> = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());

            // Without an index entry an existing artifact could be either
            // converted or signed; assume the earlier state
            let state = if tokio::fs::try_exists(self.artifact_path(id)).await? {
                DocumentState::Converted
            } else {
                DocumentState::Uploaded
            };

            debug!(id, path = %path.display(), %state, "Indexed document from directory scan");
            return Ok(Some(DocumentRecord {
                id: id.to_string(),
                extension: Some(ext.to_string()),
                source_path: path,
                state,
                created_at: modified,
                updated_at: modified,
            }));
        }
        Ok(None)
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(
        &self,
        bytes: &[u8],
        extension: Option<&str>,
    ) -> Result<DocumentRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let file_name = match extension {
            Some(ext) if !ext.is_empty() => format!("{}.{}", id, ext),
            _ => id.clone(),
        };
        let source_path = self.root.join(file_name);
        tokio::fs::write(&source_path, bytes).await?;

        let now = Utc::now();
        let record = DocumentRecord {
            id: id.clone(),
            extension: extension.filter(|e| !e.is_empty()).map(str::to_string),
            source_path,
            state: DocumentState::Uploaded,
            created_at: now,
            updated_at: now,
        };

        self.index.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn resolve(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let indexed = self.index.read().await.get(id).cloned();
        if let Some(record) = indexed {
            let is_source = record
                .extension
                .as_deref()
                .map(is_source_extension)
                .unwrap_or(false);
            if is_source && tokio::fs::try_exists(&record.source_path).await? {
                return Ok(Some(record));
            }
            return Ok(None);
        }

        let Some(record) = self.scan(id).await? else {
            return Ok(None);
        };
        let mut index = self.index.write().await;
        // A concurrent request may have indexed it first; keep that entry
        let record = index.entry(id.to_string()).or_insert(record).clone();
        Ok(Some(record))
    }

    async fn lookup(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let indexed = self.index.read().await.get(id).cloned();
        match indexed {
            Some(record) => Ok(Some(record)),
            None => self.resolve(id).await,
        }
    }

    fn artifact_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, ARTIFACT_EXTENSION))
    }

    async fn write_artifact(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(id);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn transition(
        &self,
        id: &str,
        state: DocumentState,
    ) -> Result<DocumentRecord, StoreError> {
        let mut index = self.index.write().await;
        let record = index
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownDocument(id.to_string()))?;
        record.state = state;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
