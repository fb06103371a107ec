use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_entity::notification::PushSubscription;
use notifyhub_transport::email::{EmailMessage, EmailTransport};
use notifyhub_transport::push::{PushError, PushMessage, PushTransport};

/// How a mock push endpoint should fail.
#[derive(Debug, Clone, Copy)]
pub enum MockPushFailure {
    /// 404/410: the endpoint is dead.
    Gone,
    /// The push service rejected the request with this status.
    Rejected(u16),
    /// The request never got a response.
    Transport,
}

/// [`PushTransport`] that records deliveries and fails on demand.
#[derive(Debug, Default)]
pub struct MockPushTransport {
    failures: Mutex<HashMap<String, MockPushFailure>>,
    sent: Mutex<Vec<(String, PushMessage)>>,
}

impl MockPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `endpoint` fail this way.
    pub fn fail_endpoint(&self, endpoint: &str, failure: MockPushFailure) {
        self.failures
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), failure);
    }

    /// Successful deliveries, as (endpoint, message) pairs.
    pub fn sent(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }

    /// Endpoints that received a successful delivery.
    pub fn sent_endpoints(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError> {
        if let Some(failure) = self.failures.lock().unwrap().get(&subscription.endpoint) {
            return Err(match failure {
                MockPushFailure::Gone => PushError::Gone,
                MockPushFailure::Rejected(status) => PushError::Rejected { status: *status },
                MockPushFailure::Transport => {
                    PushError::Transport("connection refused".to_string())
                }
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), message.clone()));
        Ok(())
    }
}

/// [`EmailTransport`] that records messages and fails on demand.
#[derive(Default)]
pub struct MockEmailTransport {
    fail: Mutex<bool>,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Messages handed to the relay.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for MockEmailTransport {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(AppError::new(ErrorKind::Transport, "SMTP relay unavailable"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
