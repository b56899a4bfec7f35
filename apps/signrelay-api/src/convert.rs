//! Word-to-PDF conversion
//!
//! Conversion is delegated to an external office suite running headless.
//! The call resolves once, with either the written artifact or an error.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to launch converter '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("Converter produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `source` into a PDF written at `target`
    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError>;
}

/// LibreOffice (or compatible) command-line converter
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: String,
}

impl SofficeConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Where soffice writes its output: `<outdir>/<source stem>.pdf`
fn soffice_output(source: &Path, outdir: &Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_else(|| OsStr::new("document"));
    let mut name = stem.to_os_string();
    name.push(".pdf");
    outdir.join(name)
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let outdir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let output = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(outdir)
            .arg(source)
            .output()
            .await
            .map_err(|source| ConvertError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ConvertError::Exited {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let produced = soffice_output(source, outdir);
        if !tokio::fs::try_exists(&produced).await? {
            return Err(ConvertError::MissingOutput(produced));
        }
        if produced != target {
            tokio::fs::rename(&produced, target).await?;
        }

        debug!(target = %target.display(), "Conversion finished");
        Ok(())
    }
}
