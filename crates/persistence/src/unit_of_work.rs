use async_trait::async_trait;
use domain::Event;

use crate::{InMemoryRepository, InMemoryStore, PersistenceError, Repository, Result};

/// A transaction over product storage, owning exactly one repository.
///
/// Callers open a scope with [`begin`](UnitOfWork::begin), do their work
/// through [`products`](UnitOfWork::products), [`commit`](UnitOfWork::commit)
/// on success and always finish with [`rollback`](UnitOfWork::rollback).
/// Rolling back after a commit does nothing; rolling back without one
/// discards the scope's changes.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Repository: Repository;

    /// The repository bound to the current transaction.
    fn products(&mut self) -> &mut Self::Repository;

    /// Starts a transaction with a fresh repository.
    async fn begin(&mut self) -> Result<()>;

    /// Makes the transaction's changes durable.
    async fn commit(&mut self) -> Result<()>;

    /// Discards uncommitted changes.
    async fn rollback(&mut self) -> Result<()>;

    /// Drains the events raised by every product the repository has seen.
    ///
    /// Each event is returned exactly once.
    fn collect_new_events(&mut self) -> Vec<Event> {
        self.products().take_seen_events()
    }
}

/// Unit of work over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
    products: InMemoryRepository,
    in_transaction: bool,
    committed: bool,
}

impl InMemoryUnitOfWork {
    /// Creates a unit of work over the given store.
    pub fn new(store: InMemoryStore) -> Self {
        let products = InMemoryRepository::new(store.clone());
        Self {
            store,
            products,
            in_transaction: false,
            committed: false,
        }
    }

    /// The store this unit of work writes to.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Returns true if the last transaction was committed.
    pub fn committed(&self) -> bool {
        self.committed
    }
}

impl Default for InMemoryUnitOfWork {
    fn default() -> Self {
        Self::new(InMemoryStore::new())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    type Repository = InMemoryRepository;

    fn products(&mut self) -> &mut InMemoryRepository {
        &mut self.products
    }

    async fn begin(&mut self) -> Result<()> {
        self.products = InMemoryRepository::new(self.store.clone());
        self.in_transaction = true;
        self.committed = false;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(PersistenceError::NoTransaction);
        }
        self.store.save_all(self.products.changes()).await?;
        self.in_transaction = false;
        self.committed = true;
        tracing::debug!(products = self.products.seen().len(), "transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.products.clear();
            self.in_transaction = false;
            tracing::debug!("transaction rolled back");
        }
        Ok(())
    }
}
