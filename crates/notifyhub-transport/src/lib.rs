//! Outbound delivery channels: web push and SMTP email.
//!
//! The service and workers talk to the [`PushTransport`] and
//! [`EmailTransport`] traits; the concrete clients here are the only code
//! that touches the network.

pub mod email;
pub mod push;
pub mod templates;

pub use email::{EmailMessage, EmailTransport, SmtpMailer};
pub use push::{PushError, PushMessage, PushTransport, WebPushClient};
pub use templates::TemplateRenderer;
