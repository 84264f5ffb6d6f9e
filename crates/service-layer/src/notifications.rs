//! Notifications capability and its implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::AllocationConfig;

const SUBJECT: &str = "allocation service notification";

/// Errors raised while sending a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// A sender or destination address could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be built or delivered.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl From<lettre::address::AddressError> for NotificationError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Delivery(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Delivery(err.to_string())
    }
}

/// Sends a message to a destination.
#[async_trait]
pub trait Notifications: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError>;
}

/// Notifications delivered as plain-text email over SMTP.
pub struct EmailNotifications {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl EmailNotifications {
    /// Creates a sender relaying through the configured SMTP host.
    ///
    /// No connection is made until the first message is sent.
    pub fn new(config: &AllocationConfig) -> Self {
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.smtp_host.as_str())
                .port(config.smtp_port)
                .build();
        Self {
            transport,
            sender: config.sender.clone(),
        }
    }
}

#[async_trait]
impl Notifications for EmailNotifications {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError> {
        let email = Message::builder()
            .from(self.sender.parse::<Mailbox>()?)
            .to(destination.parse::<Mailbox>()?)
            .subject(SUBJECT)
            .body(message.to_string())?;

        tracing::debug!(to = destination, "sending notification email");
        self.transport.send(email).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotificationsState {
    sent: HashMap<String, Vec<String>>,
    fail_on_send: bool,
}

/// Notifications kept in memory, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifications {
    state: Arc<Mutex<InMemoryNotificationsState>>,
}

impl InMemoryNotifications {
    /// Creates an empty notifications recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every following send to fail.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.lock().fail_on_send = fail;
    }

    /// Messages sent to a destination, oldest first.
    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.lock().sent.get(destination).cloned().unwrap_or_default()
    }

    /// Total number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.lock().sent.values().map(Vec::len).sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryNotificationsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifications for InMemoryNotifications {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotificationError> {
        let mut state = self.lock();
        if state.fail_on_send {
            return Err(NotificationError::Delivery(
                "notification channel unavailable".to_string(),
            ));
        }
        state
            .sent
            .entry(destination.to_string())
            .or_default()
            .push(message.to_string());
        Ok(())
    }
}
