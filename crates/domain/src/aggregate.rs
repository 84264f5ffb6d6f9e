//! Core aggregate and domain event traits.

use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Used for logging and for routing on the message bus.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregate roots that record the events they raise.
///
/// An aggregate is a cluster of domain objects treated as a single unit for
/// mutation. Every change goes through the root, which appends the resulting
/// events to an outbox. The outbox is drained once, by the unit of work,
/// after the transaction that produced it commits.
pub trait Aggregate: Send + Sync {
    /// The type of events this aggregate raises.
    type Event: DomainEvent;

    /// Returns the events raised since the outbox was last drained.
    fn pending_events(&self) -> &[Self::Event];

    /// Drains the outbox, returning events in the order they were raised.
    fn take_events(&mut self) -> Vec<Self::Event>;

    /// Returns true if the outbox holds events.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}
