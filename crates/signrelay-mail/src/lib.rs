//! Signed-document mail delivery
//!
//! Delivers the stamped artifact as an attachment over SMTP. The relay
//! sends every message from and to a single configured mailbox.
//!
//! Host, port and STARTTLS are fixed; only the mailbox credentials and the
//! certificate policy vary.

pub mod sender;
pub mod smtp;
pub mod types;

pub use sender::{MailError, MailSender};
pub use smtp::SmtpSender;
pub use types::{Attachment, DeliveryReceipt, OutgoingMail, ValidationError};

use secrecy::SecretString;

pub const SMTP_HOST: &str = "smtp.gmail.com";
pub const SMTP_PORT: u16 = 587;

/// Configuration for the SMTP sender
#[derive(Debug)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,

    /// Login and the single sender/recipient address
    pub address: String,

    pub password: SecretString,

    /// Accept self-signed or otherwise unverifiable certificates
    pub accept_invalid_certs: bool,
}

impl MailConfig {
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            smtp_host: SMTP_HOST.to_string(),
            smtp_port: SMTP_PORT,
            address: address.into(),
            password: SecretString::from(password.into()),
            accept_invalid_certs: false,
        }
    }
}
