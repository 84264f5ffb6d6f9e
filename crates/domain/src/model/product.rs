use common::{BatchReference, Sku};

use crate::aggregate::Aggregate;
use crate::error::{DomainError, Result};
use crate::events::{Allocated, Deallocated, Event, OutOfStock};

use super::{Batch, OrderLine};

/// Product aggregate root.
///
/// Groups every batch of one sku. All allocation goes through the product,
/// which picks the batch, keeps the version number and records the
/// resulting events in its outbox.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version_number: u64,
    events: Vec<Event>,
}

impl Aggregate for Product {
    type Event = Event;

    fn pending_events(&self) -> &[Event] {
        &self.events
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

// Query methods
impl Product {
    /// Creates a product at version 0.
    pub fn new(sku: impl Into<Sku>, batches: Vec<Batch>) -> Self {
        Self::with_version(sku, batches, 0)
    }

    /// Creates a product at a known version, as when restoring it from storage.
    pub fn with_version(sku: impl Into<Sku>, batches: Vec<Batch>, version_number: u64) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version_number,
            events: Vec::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns the batch with the given reference.
    pub fn batch(&self, reference: &BatchReference) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Returns true if one of the product's batches has the given reference.
    pub fn has_batch(&self, reference: &BatchReference) -> bool {
        self.batch(reference).is_some()
    }

    pub fn version_number(&self) -> u64 {
        self.version_number
    }

    /// Sum of allocated quantities over all batches.
    pub fn allocated_quantity(&self) -> u64 {
        self.batches.iter().map(Batch::allocated_quantity).sum()
    }
}

// Command methods (record events)
impl Product {
    /// Adds a batch to the product.
    pub fn add_batch(&mut self, batch: Batch) {
        self.batches.push(batch);
    }

    /// Allocates the line to the preferred batch that can take it.
    ///
    /// Returns the reference of the chosen batch. When no batch fits,
    /// records [`OutOfStock`] and returns `None`; that is a normal outcome.
    pub fn allocate(&mut self, line: OrderLine) -> Option<BatchReference> {
        let Some(index) = self.select_batch(&line) else {
            self.events.push(
                OutOfStock {
                    sku: line.sku().clone(),
                }
                .into(),
            );
            return None;
        };

        let event = Allocated {
            order_id: line.order_id().clone(),
            sku: line.sku().clone(),
            qty: line.qty(),
            batch_ref: self.batches[index].reference().clone(),
        };
        self.batches[index].allocate(line);
        self.version_number += 1;

        let reference = event.batch_ref.clone();
        self.events.push(event.into());
        Some(reference)
    }

    /// Sets a batch's purchased quantity, releasing lines until the batch
    /// is no longer over-allocated.
    ///
    /// Each released line is recorded as [`Deallocated`]. The order in which
    /// lines are released is unspecified.
    pub fn change_batch_quantity(&mut self, reference: &BatchReference, qty: u32) -> Result<()> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| DomainError::BatchNotFound {
                reference: reference.clone(),
            })?;

        batch.set_purchased_quantity(qty);
        while batch.available_quantity() < 0 {
            let line = batch.deallocate_one()?;
            self.events.push(
                Deallocated {
                    order_id: line.order_id().clone(),
                    sku: line.sku().clone(),
                    qty: line.qty(),
                }
                .into(),
            );
        }
        Ok(())
    }

    /// Index of the preferred batch able to take the line.
    ///
    /// On ties the earlier batch in the list wins.
    fn select_batch(&self, line: &OrderLine) -> Option<usize> {
        self.batches
            .iter()
            .enumerate()
            .filter(|(_, batch)| batch.can_allocate(line))
            .min_by(|(_, a), (_, b)| Batch::allocation_order(a, b))
            .map(|(index, _)| index)
    }
}
