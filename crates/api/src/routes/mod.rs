//! HTTP route handlers.

pub mod allocations;
pub mod health;
pub mod metrics;
