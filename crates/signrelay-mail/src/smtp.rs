//! SMTP transport
//!
//! Sends through an authenticated STARTTLS relay. The configured address is
//! both sender and recipient.

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tracing::{error, info, instrument};

use crate::sender::{MailError, MailSender};
use crate::types::{is_valid_email, DeliveryReceipt, OutgoingMail, ValidationError};
use crate::MailConfig;

/// SMTP sender
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    mailbox: Mailbox,
}

impl SmtpSender {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        if !is_valid_email(&config.address) {
            return Err(ValidationError::InvalidEmail(config.address.clone()).into());
        }
        let mailbox: Mailbox = config
            .address
            .parse()
            .map_err(|e| MailError::ConfigError(format!("{}: {}", config.address, e)))?;

        let tls = TlsParameters::builder(config.smtp_host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| MailError::ConfigError(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .tls(Tls::Required(tls))
            .credentials(Credentials::new(
                config.address.clone(),
                config.password.expose_secret().to_string(),
            ))
            .build();

        Ok(Self { transport, mailbox })
    }

    /// The address messages are sent from and to
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Assemble the MIME message: a plain text part followed by the attachments
    pub fn build_message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.text.clone()));

        for attachment in &mail.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::BuildError(format!("{}: {}", attachment.content_type, e)))?;
            body = body.singlepart(
                MimeAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(mail.subject.clone())
            .multipart(body)
            .map_err(|e| MailError::BuildError(e.to_string()))
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    #[instrument(skip(self, mail), fields(subject = %mail.subject, attachments = mail.attachments.len()))]
    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, MailError> {
        mail.validate()?;
        let message = self.build_message(&mail)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(error = %e, "SMTP transport error");
            MailError::SendFailed(e.to_string())
        })?;

        let response = response.message().collect::<Vec<_>>().join(" ");
        info!(response = %response, "Email sent successfully");

        Ok(DeliveryReceipt {
            response,
            sent_at: Utc::now(),
        })
    }
}
