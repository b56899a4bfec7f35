//! Application state for the signing relay

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use signrelay_mail::{MailSender, SmtpSender};
use signrelay_pdf::OverlayLayout;

use crate::config::{Config, DEFAULT_DATE_FORMAT};
use crate::convert::{DocumentConverter, SofficeConverter};
use crate::store::{DocumentStore, FsDocumentStore};

/// Everything the sign pipeline needs besides its collaborators
#[derive(Debug, Clone)]
pub struct SigningSettings {
    pub share_base_url: String,
    pub font_path: PathBuf,
    pub date_format: String,
    pub layout: OverlayLayout,
}

impl SigningSettings {
    pub fn share_link(&self, id: &str) -> String {
        format!("{}/{}", self.share_base_url.trim_end_matches('/'), id)
    }

    /// Today's date in the configured format, local time
    pub fn today(&self) -> String {
        let now = Local::now();
        let mut out = String::new();
        if write!(out, "{}", now.format(&self.date_format)).is_err() {
            out = now.format(DEFAULT_DATE_FORMAT).to_string();
        }
        out
    }
}

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub converter: Arc<dyn DocumentConverter>,
    pub mailer: Arc<dyn MailSender>,
    pub signing: SigningSettings,
}

impl AppState {
    /// Wire up the filesystem store, soffice converter and SMTP sender
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = FsDocumentStore::open(&config.upload_dir)
            .await
            .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;
        tracing::info!("Storing documents in {}", store.root().display());

        let mailer = SmtpSender::new(&config.mail_config()).context("configuring SMTP")?;
        tracing::info!("Mail relay: {}", mailer.mailbox());

        // Loaded per request, so a missing font only fails signing
        if !config.font_path.is_file() {
            tracing::warn!(
                "Font {} not found; signing will fail until it exists",
                config.font_path.display()
            );
        }

        let converter = SofficeConverter::new(&config.converter_program);
        tracing::info!("Converting with {}", converter.program());

        Ok(Self {
            store: Arc::new(store),
            converter: Arc::new(converter),
            mailer: Arc::new(mailer),
            signing: SigningSettings {
                share_base_url: config.share_base_url.clone(),
                font_path: config.font_path.clone(),
                date_format: config.date_format.clone(),
                layout: OverlayLayout::default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(date_format: &str) -> SigningSettings {
        SigningSettings {
            share_base_url: "http://localhost:3000/sign/".to_string(),
            font_path: PathBuf::from("fonts/DejaVuSans.ttf"),
            date_format: date_format.to_string(),
            layout: OverlayLayout::default(),
        }
    }

    #[test]
    fn test_share_link_joins_without_double_slash() {
        assert_eq!(
            settings(DEFAULT_DATE_FORMAT).share_link("abc"),
            "http://localhost:3000/sign/abc"
        );
    }

    #[test]
    fn test_today_uses_configured_format() {
        let today = settings("%Y").today();
        assert_eq!(today, Local::now().format("%Y").to_string());
    }

    #[test]
    fn test_today_falls_back_on_bad_format() {
        let today = settings("%Q").today();
        assert_eq!(today.split('.').count(), 3);
    }
}
