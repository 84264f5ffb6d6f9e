//! Service layer error types.

use common::{BatchReference, Sku};
use domain::{CommandKind, DomainError};
use persistence::PersistenceError;
use thiserror::Error;

use crate::notifications::NotificationError;

/// Errors that can occur while handling a message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No product exists for the sku.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    /// No batch exists with the reference.
    #[error("Unknown batch {0}")]
    UnknownBatch(BatchReference),

    /// No handler is registered for the command.
    #[error("No handler registered for command {0}")]
    NoHandler(CommandKind),

    /// A handler received a message it does not handle.
    #[error("Handler '{handler}' cannot handle {message}")]
    UnexpectedMessage {
        handler: &'static str,
        message: &'static str,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Notification error.
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// An event could not be encoded for publishing.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Returns true for errors caused by a reference to something that does
    /// not exist, which callers should treat as bad input.
    pub fn is_unknown_reference(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidSku(_) | ServiceError::UnknownBatch(_)
        )
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
