//! Outgoing mail.
//!
//! [`MailSender`] is the seam services send through. [`SmtpMailer`] delivers
//! over SMTP with `lettre`; [`LogMailer`] only logs and is used when mail is
//! disabled in configuration.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use quill_common::{AppError, AppResult, config::MailConfig};

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text_body: String,
    /// HTML body.
    pub html_body: Option<String>,
}

/// Something that can deliver mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a message.
    async fn send(&self, mail: OutgoingMail) -> AppResult<()>;
}

/// Build the sender described by `config`.
pub fn mailer_from_config(config: &MailConfig) -> AppResult<Arc<dyn MailSender>> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::warn!("Mail delivery disabled, messages will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// SMTP delivery via STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Create an SMTP mailer.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Mail(format!("Invalid recipient {}: {e}", mail.to)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone());

        let message = match mail.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(mail.text_body, html)),
            None => builder.body(mail.text_body),
        }
        .map_err(|e| AppError::Mail(format!("Failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail sent");
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.text_body,
            "Mail delivery disabled, logging message"
        );
        Ok(())
    }
}
