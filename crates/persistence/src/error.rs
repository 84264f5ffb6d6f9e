use common::Sku;
use thiserror::Error;

/// Errors that can occur when reading or writing products.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// The stored product was written since it was loaded in this
    /// transaction. Values are store revisions; `None` means the product did
    /// not exist.
    #[error(
        "Concurrency conflict for product {sku}: expected revision {expected:?}, found {actual:?}"
    )]
    ConcurrencyConflict {
        sku: Sku,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// Commit was called without a transaction in progress.
    #[error("No transaction in progress")]
    NoTransaction,
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
