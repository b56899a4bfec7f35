//! Mail delivery seam
//!
//! The server holds a `dyn MailSender` so the SMTP transport can be swapped
//! for a recording fake in tests.

use async_trait::async_trait;

use crate::types::{DeliveryReceipt, OutgoingMail, ValidationError};

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver `mail` to the configured recipient
    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to build email: {0}")]
    BuildError(String),

    #[error("SMTP send failed: {0}")]
    SendFailed(String),
}
