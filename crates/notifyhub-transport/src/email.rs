//! SMTP email delivery via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use notifyhub_core::config::EmailConfig;
use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;

/// A rendered email ready to hand to the relay.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub body_html: String,
    /// Plain-text alternative, when the template provides one.
    pub body_text: Option<String>,
}

/// Delivery of one rendered email.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Hand the message to the relay.
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

/// [`EmailTransport`] backed by lettre's async SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the SMTP transport from email configuration.
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let transport = if config.use_tls {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Configuration, "Invalid SMTP relay host", e)
                })?
                .credentials(creds)
                .port(config.port)
                .build()
        } else if !config.username.is_empty() {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .credentials(creds)
                .port(config.port)
                .build()
        } else {
            // Unauthenticated relay, e.g. Mailpit in development.
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        };

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Invalid from address", e)
            })?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &EmailMessage) -> AppResult<Message> {
        let to: Mailbox = email.to.parse().map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Invalid recipient address", e)
        })?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        let message = match &email.body_text {
            Some(text) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(email.body_html.clone()),
                        ),
                )
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Internal, "Failed to build email", e)
                })?,
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(email.body_html.clone())
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Internal, "Failed to build email", e)
                })?,
        };

        Ok(message)
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send(&self, email: &EmailMessage) -> AppResult<()> {
        let message = self.build_message(email)?;

        self.transport.send(message).await.map_err(|e| {
            AppError::with_source(ErrorKind::Transport, "SMTP delivery failed", e)
        })?;

        tracing::debug!(to = %email.to, subject = %email.subject, "Email handed to relay");
        Ok(())
    }
}
