use std::collections::HashMap;

use async_trait::async_trait;
use common::{BatchReference, Sku};
use domain::{Aggregate, Event, Product};

use crate::{InMemoryStore, Result};

/// Collection-like access to product aggregates.
///
/// Every product added, and every product returned by a lookup, is recorded
/// as "seen" (once, in first-seen order). The unit of work relies on this to
/// collect the events those products raised. Implementations must keep the
/// tracking themselves.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Adds a new product.
    async fn add(&mut self, product: Product) -> Result<()>;

    /// Returns the product with the given sku.
    async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>>;

    /// Returns the product owning the batch with the given reference.
    async fn get_by_batch_ref(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<&mut Product>>;

    /// Skus of every product seen so far, in first-seen order.
    fn seen(&self) -> &[Sku];

    /// Drains the outbox of every seen product, product by product.
    fn take_seen_events(&mut self) -> Vec<Event>;
}

/// Repository over an [`InMemoryStore`].
///
/// Loaded products are kept in an identity map for the life of the
/// repository: a second lookup of the same sku returns the same instance,
/// with the changes already made to it.
#[derive(Debug)]
pub struct InMemoryRepository {
    store: InMemoryStore,
    loaded: HashMap<Sku, Product>,
    /// Store revision each product had when loaded; `None` for added products.
    loaded_revisions: HashMap<Sku, Option<u64>>,
    seen: Vec<Sku>,
}

impl InMemoryRepository {
    /// Creates an empty repository reading from the given store.
    pub fn new(store: InMemoryStore) -> Self {
        Self {
            store,
            loaded: HashMap::new(),
            loaded_revisions: HashMap::new(),
            seen: Vec::new(),
        }
    }

    /// Copies of every loaded product with the store revision it was loaded
    /// at.
    ///
    /// The identity map is left as is, so events raised in the transaction
    /// can still be collected after the copies are written.
    pub fn changes(&self) -> Vec<(Product, Option<u64>)> {
        self.loaded
            .iter()
            .map(|(sku, product)| {
                let revision = self.loaded_revisions.get(sku).copied().flatten();
                (product.clone(), revision)
            })
            .collect()
    }

    /// Forgets everything loaded or seen.
    pub fn clear(&mut self) {
        self.loaded.clear();
        self.loaded_revisions.clear();
        self.seen.clear();
    }

    fn mark_seen(&mut self, sku: &Sku) {
        if !self.seen.contains(sku) {
            self.seen.push(sku.clone());
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add(&mut self, product: Product) -> Result<()> {
        let sku = product.sku().clone();
        self.loaded_revisions.entry(sku.clone()).or_insert(None);
        self.mark_seen(&sku);
        self.loaded.insert(sku, product);
        Ok(())
    }

    async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>> {
        if !self.loaded.contains_key(sku) {
            let Some((product, revision)) = self.store.load_with_revision(sku).await else {
                return Ok(None);
            };
            self.loaded_revisions.insert(sku.clone(), Some(revision));
            self.loaded.insert(sku.clone(), product);
        }
        self.mark_seen(sku);
        Ok(self.loaded.get_mut(sku))
    }

    async fn get_by_batch_ref(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<&mut Product>> {
        let in_map = self
            .loaded
            .values()
            .find(|product| product.has_batch(reference))
            .map(|product| product.sku().clone());

        let sku = match in_map {
            Some(sku) => sku,
            None => match self.store.find_sku_by_batch_ref(reference).await {
                Some(sku) => sku,
                None => return Ok(None),
            },
        };
        self.get(&sku).await
    }

    fn seen(&self) -> &[Sku] {
        &self.seen
    }

    fn take_seen_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for sku in &self.seen {
            if let Some(product) = self.loaded.get_mut(sku) {
                events.extend(product.take_events());
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Batch, OrderLine};

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .save_all(vec![
                (
                    Product::new("LAMP", vec![Batch::new("b-lamp", "LAMP", 10, None)]),
                    None,
                ),
                (
                    Product::new("CHAIR", vec![Batch::new("b-chair", "CHAIR", 10, None)]),
                    None,
                ),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn get_marks_product_as_seen() {
        let mut repo = InMemoryRepository::new(seeded_store().await);

        let product = repo.get(&Sku::new("LAMP")).await.unwrap();

        assert!(product.is_some());
        assert_eq!(repo.seen(), &[Sku::new("LAMP")]);
    }

    #[tokio::test]
    async fn missing_product_is_not_seen() {
        let mut repo = InMemoryRepository::new(seeded_store().await);

        let product = repo.get(&Sku::new("NOPE")).await.unwrap();

        assert!(product.is_none());
        assert!(repo.seen().is_empty());
    }

    #[tokio::test]
    async fn seen_is_deduplicated_and_keeps_first_seen_order() {
        let mut repo = InMemoryRepository::new(seeded_store().await);

        repo.get(&Sku::new("CHAIR")).await.unwrap();
        repo.get(&Sku::new("LAMP")).await.unwrap();
        repo.get_by_batch_ref(&BatchReference::new("b-chair"))
            .await
            .unwrap();
        repo.add(Product::new("TABLE", vec![])).await.unwrap();

        assert_eq!(
            repo.seen(),
            &[Sku::new("CHAIR"), Sku::new("LAMP"), Sku::new("TABLE")]
        );
    }

    #[tokio::test]
    async fn identity_map_returns_same_instance() {
        let mut repo = InMemoryRepository::new(seeded_store().await);

        let lamp = repo.get(&Sku::new("LAMP")).await.unwrap().unwrap();
        lamp.allocate(OrderLine::new("o1", "LAMP", 4));

        let again = repo
            .get_by_batch_ref(&BatchReference::new("b-lamp"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.version_number(), 1);
        assert_eq!(again.allocated_quantity(), 4);
    }

    #[tokio::test]
    async fn get_by_batch_ref_finds_added_product() {
        let mut repo = InMemoryRepository::new(InMemoryStore::new());
        repo.add(Product::new(
            "TABLE",
            vec![Batch::new("b-table", "TABLE", 5, None)],
        ))
        .await
        .unwrap();

        let product = repo
            .get_by_batch_ref(&BatchReference::new("b-table"))
            .await
            .unwrap();

        assert_eq!(product.map(|p| p.sku().clone()), Some(Sku::new("TABLE")));
    }

    #[tokio::test]
    async fn take_seen_events_drains_in_seen_order() {
        let mut repo = InMemoryRepository::new(seeded_store().await);

        repo.get(&Sku::new("CHAIR"))
            .await
            .unwrap()
            .unwrap()
            .allocate(OrderLine::new("o1", "CHAIR", 1));
        repo.get(&Sku::new("LAMP"))
            .await
            .unwrap()
            .unwrap()
            .allocate(OrderLine::new("o2", "LAMP", 100));

        let events = repo.take_seen_events();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sku().as_str(), "CHAIR");
        assert!(matches!(events[1], Event::OutOfStock(_)));
        assert!(repo.take_seen_events().is_empty());
    }

    #[tokio::test]
    async fn changes_report_loaded_revisions() {
        let mut repo = InMemoryRepository::new(seeded_store().await);
        repo.get(&Sku::new("LAMP")).await.unwrap();
        repo.add(Product::new("TABLE", vec![])).await.unwrap();

        let mut changes = repo.changes();
        changes.sort_by(|a, b| a.0.sku().cmp(b.0.sku()));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].0.sku().as_str(), "LAMP");
        assert_eq!(changes[0].1, Some(0));
        assert_eq!(changes[1].0.sku().as_str(), "TABLE");
        assert_eq!(changes[1].1, None);
    }
}
