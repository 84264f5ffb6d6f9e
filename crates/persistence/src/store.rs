use std::collections::HashMap;
use std::sync::Arc;

use common::{BatchReference, Sku};
use domain::{Aggregate, Product};
use tokio::sync::RwLock;

use crate::{PersistenceError, Result};

/// A committed product and the store revision it was written at.
///
/// The revision is owned by the store and moves on every write, whatever
/// the write changed. The product's own version number is a domain concept
/// and is not used for conflict detection.
#[derive(Debug, Clone)]
struct StoredProduct {
    product: Product,
    revision: u64,
}

/// Committed product state shared by every unit of work built on it.
///
/// Cloning the store clones the handle, not the data. Products are stored
/// with an empty outbox; events only live in the transaction that raised
/// them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<Sku, StoredProduct>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the committed product, if any.
    pub async fn load(&self, sku: &Sku) -> Option<Product> {
        self.load_with_revision(sku)
            .await
            .map(|(product, _)| product)
    }

    /// Returns a copy of the committed product with its store revision.
    pub async fn load_with_revision(&self, sku: &Sku) -> Option<(Product, u64)> {
        self.products
            .read()
            .await
            .get(sku)
            .map(|stored| (stored.product.clone(), stored.revision))
    }

    /// Returns the sku of the product owning the given batch.
    pub async fn find_sku_by_batch_ref(&self, reference: &BatchReference) -> Option<Sku> {
        self.products
            .read()
            .await
            .values()
            .find(|stored| stored.product.has_batch(reference))
            .map(|stored| stored.product.sku().clone())
    }

    /// Writes products back atomically.
    ///
    /// Each entry carries the revision the product had when it was loaded
    /// (`None` for a product added in the transaction). Every entry is
    /// checked against the current revision before anything is written; a
    /// new product starts at revision 0 and each write adds one.
    pub async fn save_all(&self, changes: Vec<(Product, Option<u64>)>) -> Result<()> {
        let mut products = self.products.write().await;

        for (product, expected) in &changes {
            let actual = products.get(product.sku()).map(|stored| stored.revision);
            if actual != *expected {
                metrics::counter!("persistence_concurrency_conflicts_total").increment(1);
                return Err(PersistenceError::ConcurrencyConflict {
                    sku: product.sku().clone(),
                    expected: *expected,
                    actual,
                });
            }
        }

        for (mut product, expected) in changes {
            let discarded = product.take_events();
            if !discarded.is_empty() {
                tracing::trace!(sku = %product.sku(), count = discarded.len(), "outbox not stored");
            }
            let revision = expected.map_or(0, |r| r + 1);
            products.insert(product.sku().clone(), StoredProduct { product, revision });
        }

        Ok(())
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }
}
