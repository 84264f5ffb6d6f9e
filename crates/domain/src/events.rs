//! Allocation domain events.

use common::{BatchReference, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// An order line was allocated to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
    pub batch_ref: BatchReference,
}

/// An order line was released from a batch and needs a new home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

/// No batch of the product could take an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
}

/// Events raised by the product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// An order line was allocated.
    Allocated(Allocated),

    /// An order line was deallocated.
    Deallocated(Deallocated),

    /// A product ran out of stock.
    OutOfStock(OutOfStock),
}

/// Discriminant of [`Event`], used as the routing key for handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Allocated,
    Deallocated,
    OutOfStock,
}

impl Event {
    /// Returns the routing key of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Allocated(_) => EventKind::Allocated,
            Event::Deallocated(_) => EventKind::Deallocated,
            Event::OutOfStock(_) => EventKind::OutOfStock,
        }
    }

    /// Returns the product the event concerns.
    pub fn sku(&self) -> &Sku {
        match self {
            Event::Allocated(data) => &data.sku,
            Event::Deallocated(data) => &data.sku,
            Event::OutOfStock(data) => &data.sku,
        }
    }
}

impl DomainEvent for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::Allocated(_) => "Allocated",
            Event::Deallocated(_) => "Deallocated",
            Event::OutOfStock(_) => "OutOfStock",
        }
    }
}

impl From<Allocated> for Event {
    fn from(data: Allocated) -> Self {
        Event::Allocated(data)
    }
}

impl From<Deallocated> for Event {
    fn from(data: Deallocated) -> Self {
        Event::Deallocated(data)
    }
}

impl From<OutOfStock> for Event {
    fn from(data: OutOfStock) -> Self {
        Event::OutOfStock(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_and_type() {
        let event: Event = OutOfStock {
            sku: Sku::new("SMALL-FORK"),
        }
        .into();

        assert_eq!(event.kind(), EventKind::OutOfStock);
        assert_eq!(event.event_type(), "OutOfStock");
        assert_eq!(event.sku().as_str(), "SMALL-FORK");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event: Event = Allocated {
            order_id: OrderId::new("o1"),
            sku: Sku::new("LAMP"),
            qty: 3,
            batch_ref: BatchReference::new("b1"),
        }
        .into();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Allocated");
        assert_eq!(json["data"]["batch_ref"], "b1");
        assert_eq!(json["data"]["qty"], 3);
    }
}
