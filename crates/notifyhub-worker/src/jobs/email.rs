//! Send email job handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use notifyhub_core::clock::Clock;
use notifyhub_core::error::ErrorKind;
use notifyhub_entity::job::model::Job;
use notifyhub_entity::job::payload::SendEmailPayload;
use notifyhub_queue::names;
use notifyhub_transport::email::{EmailMessage, EmailTransport};
use notifyhub_transport::templates::TemplateRenderer;

use crate::executor::{JobExecutionError, JobHandler};

/// Renders a templated email and hands it to the SMTP relay.
///
/// Rendering failures are permanent: the payload will not get better on
/// retry. Relay failures are transient and retried per the job's backoff
/// policy.
pub struct SendEmailHandler {
    transport: Arc<dyn EmailTransport>,
    renderer: TemplateRenderer,
    clock: Arc<dyn Clock>,
}

impl SendEmailHandler {
    /// Create a new send email handler.
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        renderer: TemplateRenderer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            renderer,
            clock,
        }
    }
}

#[async_trait]
impl JobHandler for SendEmailHandler {
    fn job_type(&self) -> &str {
        names::SEND_EMAIL
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let payload: SendEmailPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid email payload: {e}")))?;

        let html_template = format!("{}.html", payload.template);
        if !self.renderer.has_template(&html_template) {
            return Err(JobExecutionError::Permanent(format!(
                "Unknown email template '{}'",
                payload.template
            )));
        }
        let body_html = self
            .renderer
            .render(&html_template, &payload.data)
            .map_err(|e| JobExecutionError::Permanent(e.to_string()))?;

        let text_template = format!("{}.txt", payload.template);
        let body_text = if self.renderer.has_template(&text_template) {
            Some(
                self.renderer
                    .render(&text_template, &payload.data)
                    .map_err(|e| JobExecutionError::Permanent(e.to_string()))?,
            )
        } else {
            None
        };

        let message = EmailMessage {
            to: payload.to.clone(),
            subject: payload.subject.clone(),
            body_html,
            body_text,
        };
        self.transport.send(&message).await.map_err(|e| {
            if e.kind == ErrorKind::Transport {
                JobExecutionError::Transient(e.to_string())
            } else {
                JobExecutionError::Permanent(e.to_string())
            }
        })?;

        let sent_at = self.clock.now();
        tracing::info!(to = %payload.to, template = %payload.template, "Email sent");
        Ok(Some(serde_json::json!({
            "to": payload.to,
            "subject": payload.subject,
            "sent_at": sent_at,
        })))
    }
}
