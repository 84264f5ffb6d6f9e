//! Domain layer for the allocation service.
//!
//! This crate provides the write-side model:
//! - [`Batch`], [`OrderLine`] and the [`Product`] aggregate root
//! - [`Aggregate`] and [`DomainEvent`] traits
//! - Commands (intentions) and events (facts) that travel on the message bus

pub mod aggregate;
pub mod commands;
pub mod error;
pub mod events;
pub mod message;
pub mod model;

pub use aggregate::{Aggregate, DomainEvent};
pub use commands::{Allocate, ChangeBatchQuantity, Command, CommandKind, CreateBatch};
pub use error::DomainError;
pub use events::{Allocated, Deallocated, Event, EventKind, OutOfStock};
pub use message::Message;
pub use model::{Batch, OrderLine, Product};
