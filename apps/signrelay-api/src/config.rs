//! Server configuration
//!
//! Every option is a command-line flag with an environment fallback, so a
//! `.env` file is enough to run the service.

use std::path::PathBuf;

use axum::http::HeaderValue;
use chrono::format::{Item, StrftimeItems};
use clap::Parser;
use signrelay_mail::MailConfig;
use thiserror::Error;

pub const DEFAULT_DATE_FORMAT: &str = "%-d.%-m.%Y";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid allowed origin '{0}'")]
    InvalidOrigin(String),

    #[error("Invalid date format '{0}'")]
    InvalidDateFormat(String),

    #[error("Body limit must be greater than zero")]
    ZeroBodyLimit,
}

/// Command-line arguments for the signing relay
#[derive(Parser, Clone)]
#[command(name = "signrelay-api")]
#[command(about = "Upload Word documents, sign them, and mail the signed PDF")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Directory holding uploads and their converted artifacts
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// TrueType font used for the attestation line
    #[arg(long, env = "FONT_PATH", default_value = "fonts/DejaVuSans.ttf")]
    pub font_path: PathBuf,

    /// The single origin allowed by CORS
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
    pub allowed_origin: String,

    /// Base of the share link returned by uploads
    #[arg(long, env = "SHARE_BASE_URL", default_value = "http://localhost:3000/sign")]
    pub share_base_url: String,

    /// Maximum request body size in bytes
    #[arg(long, env = "BODY_LIMIT_BYTES", default_value = "10485760")]
    pub body_limit_bytes: usize,

    /// Office suite executable used for Word-to-PDF conversion
    #[arg(long = "converter", env = "CONVERTER_PROGRAM", default_value = "soffice")]
    pub converter_program: String,

    /// strftime format of the attestation date
    #[arg(long, env = "DATE_FORMAT", default_value = DEFAULT_DATE_FORMAT)]
    pub date_format: String,

    /// Mailbox used to send and receive signed documents
    #[arg(long, env = "EMAIL_ADDRESS")]
    pub email_address: String,

    /// Password for the mailbox
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: String,

    /// Accept unverifiable SMTP server certificates
    #[arg(long, env = "SMTP_ACCEPT_INVALID_CERTS")]
    pub smtp_accept_invalid_certs: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("upload_dir", &self.upload_dir)
            .field("font_path", &self.font_path)
            .field("allowed_origin", &self.allowed_origin)
            .field("share_base_url", &self.share_base_url)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .field("converter_program", &self.converter_program)
            .field("date_format", &self.date_format)
            .field("email_address", &self.email_address)
            .field("smtp_accept_invalid_certs", &self.smtp_accept_invalid_certs)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Check values clap cannot, returning the parsed CORS origin
    pub fn validate(&self) -> Result<HeaderValue, ConfigError> {
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        if !is_valid_date_format(&self.date_format) {
            return Err(ConfigError::InvalidDateFormat(self.date_format.clone()));
        }
        parse_origin(&self.allowed_origin)
    }

    pub fn mail_config(&self) -> MailConfig {
        let mut config = MailConfig::new(&self.email_address, &self.email_password);
        config.accept_invalid_certs = self.smtp_accept_invalid_certs;
        config
    }
}

pub fn parse_origin(origin: &str) -> Result<HeaderValue, ConfigError> {
    let trimmed = origin.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "*" {
        return Err(ConfigError::InvalidOrigin(origin.to_string()));
    }
    HeaderValue::from_str(trimmed).map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
}

pub fn is_valid_date_format(format: &str) -> bool {
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
