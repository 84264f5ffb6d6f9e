//! Allocations read model: where each order's lines were allocated.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchReference, OrderId, Sku};
use domain::{DomainEvent, Event, EventKind};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::projection::Projection;

/// One allocated line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRow {
    pub sku: Sku,
    #[serde(rename = "batchref")]
    pub batch_ref: BatchReference,
}

#[derive(Default)]
struct AllocationsState {
    by_order: HashMap<OrderId, Vec<AllocationRow>>,
    events_applied: u64,
}

/// Denormalized view of allocations keyed by order.
///
/// Fed by `Allocated` (insert) and `Deallocated` (delete) events; answers
/// "which batches did this order land in" without loading any aggregate.
#[derive(Clone, Default)]
pub struct AllocationsView {
    state: Arc<RwLock<AllocationsState>>,
}

impl AllocationsView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an order's line for `sku` sits in `batch_ref`.
    pub async fn insert(&self, order_id: OrderId, sku: Sku, batch_ref: BatchReference) {
        let mut state = self.state.write().await;
        let rows = state.by_order.entry(order_id).or_default();
        rows.retain(|row| row.sku != sku);
        rows.push(AllocationRow { sku, batch_ref });
    }

    /// Removes an order's line for `sku`.
    pub async fn delete(&self, order_id: &OrderId, sku: &Sku) {
        let mut state = self.state.write().await;
        if let Some(rows) = state.by_order.get_mut(order_id) {
            rows.retain(|row| row.sku != *sku);
            if rows.is_empty() {
                state.by_order.remove(order_id);
            }
        }
    }

    /// Returns the allocated lines of an order, in insertion order.
    pub async fn allocations(&self, order_id: &OrderId) -> Vec<AllocationRow> {
        self.state
            .read()
            .await
            .by_order
            .get(order_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of orders with at least one allocated line.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.by_order.len()
    }
}

#[async_trait]
impl Projection for AllocationsView {
    fn name(&self) -> &'static str {
        "AllocationsView"
    }

    fn subscribes_to(&self) -> &'static [EventKind] {
        &[EventKind::Allocated, EventKind::Deallocated]
    }

    async fn apply(&self, event: &Event) {
        match event {
            Event::Allocated(data) => {
                self.insert(
                    data.order_id.clone(),
                    data.sku.clone(),
                    data.batch_ref.clone(),
                )
                .await;
            }
            Event::Deallocated(data) => {
                self.delete(&data.order_id, &data.sku).await;
            }
            Event::OutOfStock(_) => return,
        }

        let mut state = self.state.write().await;
        state.events_applied += 1;
        metrics::counter!("projection_events_processed_total", "projection" => self.name())
            .increment(1);
        tracing::debug!(
            projection = self.name(),
            event = event.event_type(),
            events_applied = state.events_applied,
            "event projected"
        );
    }

    async fn events_applied(&self) -> u64 {
        self.state.read().await.events_applied
    }
}
