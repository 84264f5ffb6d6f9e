use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use common::{BatchReference, Sku};

use crate::error::{DomainError, Result};

use super::OrderLine;

/// A batch of purchased stock for one product.
///
/// Entity: identity, equality and hashing are by `reference` only. A batch
/// without an `eta` is already in the warehouse; a dated batch is a
/// shipment still on its way.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    eta: Option<NaiveDate>,
    purchased_quantity: u32,
    allocations: HashSet<OrderLine>,
}

impl Batch {
    /// Creates a new batch with no allocations.
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            eta,
            purchased_quantity,
            allocations: HashSet::new(),
        }
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    /// Returns the lines currently allocated to this batch.
    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    /// Sum of the quantities of all allocated lines.
    pub fn allocated_quantity(&self) -> u64 {
        self.allocations.iter().map(|line| u64::from(line.qty())).sum()
    }

    /// Purchased quantity minus allocated quantity.
    ///
    /// Negative only transiently, while a quantity reduction is being
    /// resolved by the product.
    pub fn available_quantity(&self) -> i64 {
        let allocated = i64::try_from(self.allocated_quantity()).unwrap_or(i64::MAX);
        i64::from(self.purchased_quantity) - allocated
    }

    /// Returns true if the line is for this batch's product and fits in the
    /// available quantity.
    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == *line.sku() && self.available_quantity() >= i64::from(line.qty())
    }

    /// Allocates the line if it fits; otherwise does nothing.
    ///
    /// Allocating a line that is already allocated changes nothing.
    pub fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) {
            self.allocations.insert(line);
        }
    }

    /// Releases the line if it is allocated to this batch.
    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.remove(line);
    }

    /// Releases and returns an arbitrary allocated line.
    ///
    /// Which line comes out is unspecified.
    pub fn deallocate_one(&mut self) -> Result<OrderLine> {
        let line = self
            .allocations
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| DomainError::EmptyAllocations {
                reference: self.reference.clone(),
            })?;
        self.allocations.remove(&line);
        Ok(line)
    }

    pub(crate) fn set_purchased_quantity(&mut self, qty: u32) {
        self.purchased_quantity = qty;
    }

    /// Allocation preference between two batches: warehouse stock first,
    /// then shipments by earliest eta.
    ///
    /// `None < Some(_)` for `Option`, which is exactly the warehouse-first
    /// rule.
    pub fn allocation_order(a: &Batch, b: &Batch) -> Ordering {
        a.eta.cmp(&b.eta)
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}
