//! Shared identifier types used across the allocation workspace.

pub mod types;

pub use types::{BatchReference, CorrelationId, OrderId, Sku};
