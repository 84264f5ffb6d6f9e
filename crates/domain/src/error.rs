//! Domain error types.

use common::BatchReference;
use thiserror::Error;

/// Invariant violations raised by the domain model.
///
/// Normal business outcomes (running out of stock, allocating a line twice)
/// are not errors; they are events or silent no-ops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The product has no batch with this reference.
    #[error("Batch not found: {reference}")]
    BatchNotFound { reference: BatchReference },

    /// A line was requested from a batch that has no allocations.
    #[error("Batch {reference} has no allocations to release")]
    EmptyAllocations { reference: BatchReference },
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
