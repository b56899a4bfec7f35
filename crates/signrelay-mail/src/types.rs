//! Outgoing mail structures

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Gmail rejects messages above 25 MB
pub const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

/// A message to the configured mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Email subject
    pub subject: String,

    /// Plain text body
    pub text: String,

    /// Files attached to the message
    pub attachments: Vec<Attachment>,
}

impl OutgoingMail {
    pub fn new(subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            text: text.into(),
            attachments: vec![],
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Validate the message before it reaches the transport
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::MissingField("text"));
        }

        let total: usize = self.attachments.iter().map(|a| a.content.len()).sum();
        if total > MAX_ATTACHMENT_BYTES {
            return Err(ValidationError::AttachmentTooLarge(
                total,
                MAX_ATTACHMENT_BYTES,
            ));
        }
        for attachment in &self.attachments {
            if attachment.filename.is_empty() {
                return Err(ValidationError::MissingField("attachment filename"));
            }
            if attachment.content.is_empty() {
                return Err(ValidationError::EmptyAttachment(attachment.filename.clone()));
            }
        }

        Ok(())
    }
}

/// Email attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename shown to the recipient
    pub filename: String,

    /// Raw file content
    pub content: Vec<u8>,

    /// MIME type (e.g., "application/pdf")
    pub content_type: String,
}

impl Attachment {
    pub fn pdf(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            content_type: "application/pdf".to_string(),
        }
    }
}

/// Transport acknowledgement for a delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Server response text (e.g., "2.0.0 OK")
    pub response: String,

    /// When the transport accepted the message
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Attachment is empty: {0}")]
    EmptyAttachment(String),

    #[error("Attachment too large: {0} bytes (max {1})")]
    AttachmentTooLarge(usize, usize),
}

/// Check an address, accepting the "Name <email@domain.com>" form
pub fn is_valid_email(email: &str) -> bool {
    let email = match (email.find('<'), email.rfind('>')) {
        (Some(start), Some(end)) if start < end => &email[start + 1..end],
        _ => email,
    };

    email_address::EmailAddress::is_valid(email.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn signed_mail() -> OutgoingMail {
        OutgoingMail::new("Document signed by: Ada", "The document was signed by Ada.")
            .with_attachment(Attachment::pdf("doc.pdf", b"%PDF-1.7".to_vec()))
    }

    #[test]
    fn test_valid_mail_passes() {
        assert_eq!(signed_mail().validate(), Ok(()));
    }

    #[test]
    fn test_missing_subject() {
        let mut mail = signed_mail();
        mail.subject = "  ".to_string();
        assert_eq!(
            mail.validate(),
            Err(ValidationError::MissingField("subject"))
        );
    }

    #[test]
    fn test_empty_attachment() {
        let mail = OutgoingMail::new("s", "t").with_attachment(Attachment::pdf("a.pdf", vec![]));
        assert_eq!(
            mail.validate(),
            Err(ValidationError::EmptyAttachment("a.pdf".to_string()))
        );
    }

    #[test]
    fn test_attachment_too_large() {
        let mail = OutgoingMail::new("s", "t")
            .with_attachment(Attachment::pdf("a.pdf", vec![0; MAX_ATTACHMENT_BYTES + 1]));
        assert!(matches!(
            mail.validate(),
            Err(ValidationError::AttachmentTooLarge(_, MAX_ATTACHMENT_BYTES))
        ));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("relay@example.com"));
        assert!(is_valid_email("Relay <relay@example.com>"));
        assert!(!is_valid_email("not-an-address"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_pdf_attachment_mime() {
        let attachment = Attachment::pdf("x.pdf", vec![1]);
        assert_eq!(attachment.content_type, "application/pdf");
    }
}
