//! Command handlers.
//!
//! Each handler opens a transaction, does its work through the repository,
//! commits, and always rolls back afterwards. The rollback is a no-op once
//! the commit went through, and discards the work when anything before it
//! failed.

use async_trait::async_trait;
use common::BatchReference;
use domain::{
    Allocate, Batch, ChangeBatchQuantity, Command, CommandKind, CreateBatch, OrderLine, Product,
};
use persistence::{Repository, UnitOfWork};

use super::{CommandHandler, CommandOutcome};
use crate::{Result, ServiceError};

/// Registers a new batch, creating the product on its first batch.
#[tracing::instrument(skip(uow), fields(reference = %cmd.reference, sku = %cmd.sku))]
pub async fn add_batch<U: UnitOfWork>(cmd: &CreateBatch, uow: &mut U) -> Result<()> {
    uow.begin().await?;
    let result = add_batch_in_transaction(cmd, uow).await;
    finish(result, uow.rollback().await)
}

async fn add_batch_in_transaction<U: UnitOfWork>(cmd: &CreateBatch, uow: &mut U) -> Result<()> {
    let batch = Batch::new(cmd.reference.clone(), cmd.sku.clone(), cmd.qty, cmd.eta);
    let existing = uow.products().get(&cmd.sku).await?;
    match existing {
        Some(product) => product.add_batch(batch),
        None => {
            uow.products()
                .add(Product::new(cmd.sku.clone(), vec![batch]))
                .await?
        }
    }
    uow.commit().await?;
    Ok(())
}

/// Allocates an order line to the product's preferred batch.
///
/// Returns `None` when the product is out of stock, which is not an error.
/// Fails with [`ServiceError::InvalidSku`] when the product does not exist.
#[tracing::instrument(skip(uow), fields(order_id = %cmd.order_id, sku = %cmd.sku))]
pub async fn allocate<U: UnitOfWork>(
    cmd: &Allocate,
    uow: &mut U,
) -> Result<Option<BatchReference>> {
    uow.begin().await?;
    let result = allocate_in_transaction(cmd, uow).await;
    finish(result, uow.rollback().await)
}

async fn allocate_in_transaction<U: UnitOfWork>(
    cmd: &Allocate,
    uow: &mut U,
) -> Result<Option<BatchReference>> {
    let line = OrderLine::new(cmd.order_id.clone(), cmd.sku.clone(), cmd.qty);
    let product = uow
        .products()
        .get(&cmd.sku)
        .await?
        .ok_or_else(|| ServiceError::InvalidSku(cmd.sku.clone()))?;

    let batch_ref = product.allocate(line);
    uow.commit().await?;

    if batch_ref.is_some() {
        metrics::counter!("allocations_total").increment(1);
    }
    Ok(batch_ref)
}

/// Changes a batch's purchased quantity, releasing lines that no longer fit.
///
/// Fails with [`ServiceError::UnknownBatch`] when no product owns the batch.
#[tracing::instrument(skip(uow), fields(reference = %cmd.reference, qty = cmd.qty))]
pub async fn change_batch_quantity<U: UnitOfWork>(
    cmd: &ChangeBatchQuantity,
    uow: &mut U,
) -> Result<()> {
    uow.begin().await?;
    let result = change_batch_quantity_in_transaction(cmd, uow).await;
    finish(result, uow.rollback().await)
}

async fn change_batch_quantity_in_transaction<U: UnitOfWork>(
    cmd: &ChangeBatchQuantity,
    uow: &mut U,
) -> Result<()> {
    let product = uow
        .products()
        .get_by_batch_ref(&cmd.reference)
        .await?
        .ok_or_else(|| ServiceError::UnknownBatch(cmd.reference.clone()))?;

    product.change_batch_quantity(&cmd.reference, cmd.qty)?;
    uow.commit().await?;
    Ok(())
}

/// Combines the transaction's result with the closing rollback, keeping the
/// first error.
fn finish<T>(result: Result<T>, rollback: persistence::Result<()>) -> Result<T> {
    let value = result?;
    rollback?;
    Ok(value)
}

fn unexpected(handler: &'static str, command: &Command) -> ServiceError {
    ServiceError::UnexpectedMessage {
        handler,
        message: command.kind().as_str(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddBatchHandler;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for AddBatchHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::CreateBatch
    }

    async fn handle(&self, command: &Command, uow: &mut U) -> Result<CommandOutcome> {
        let Command::CreateBatch(cmd) = command else {
            return Err(unexpected("add_batch", command));
        };
        add_batch(cmd, uow).await?;
        Ok(CommandOutcome::BatchAdded)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocateHandler;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for AllocateHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::Allocate
    }

    async fn handle(&self, command: &Command, uow: &mut U) -> Result<CommandOutcome> {
        let Command::Allocate(cmd) = command else {
            return Err(unexpected("allocate", command));
        };
        let batch_ref = allocate(cmd, uow).await?;
        Ok(CommandOutcome::Allocated { batch_ref })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeBatchQuantityHandler;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for ChangeBatchQuantityHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::ChangeBatchQuantity
    }

    async fn handle(&self, command: &Command, uow: &mut U) -> Result<CommandOutcome> {
        let Command::ChangeBatchQuantity(cmd) = command else {
            return Err(unexpected("change_batch_quantity", command));
        };
        change_batch_quantity(cmd, uow).await?;
        Ok(CommandOutcome::BatchQuantityChanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Sku;
    use persistence::InMemoryUnitOfWork;

    #[tokio::test]
    async fn add_batch_for_new_product() {
        let mut uow = InMemoryUnitOfWork::default();

        add_batch(&CreateBatch::new("b1", "CRUNCHY-ARMCHAIR", 100, None), &mut uow)
            .await
            .unwrap();

        let product = uow.store().load(&Sku::new("CRUNCHY-ARMCHAIR")).await.unwrap();
        assert_eq!(product.batches().len(), 1);
        assert!(uow.committed());
    }

    #[tokio::test]
    async fn add_batch_for_existing_product() {
        let mut uow = InMemoryUnitOfWork::default();

        add_batch(&CreateBatch::new("b1", "GARISH-RUG", 100, None), &mut uow)
            .await
            .unwrap();
        add_batch(&CreateBatch::new("b2", "GARISH-RUG", 99, None), &mut uow)
            .await
            .unwrap();

        let product = uow.store().load(&Sku::new("GARISH-RUG")).await.unwrap();
        assert!(product.has_batch(&"b1".into()));
        assert!(product.has_batch(&"b2".into()));
        assert_eq!(uow.store().product_count().await, 1);
    }

    #[tokio::test]
    async fn allocate_returns_batch_ref() {
        let mut uow = InMemoryUnitOfWork::default();
        add_batch(&CreateBatch::new("batch1", "COMPLICATED-LAMP", 100, None), &mut uow)
            .await
            .unwrap();

        let result = allocate(&Allocate::new("o1", "COMPLICATED-LAMP", 10), &mut uow)
            .await
            .unwrap();

        assert_eq!(result, Some(BatchReference::new("batch1")));
    }

    #[tokio::test]
    async fn allocate_errors_for_invalid_sku() {
        let mut uow = InMemoryUnitOfWork::default();
        add_batch(&CreateBatch::new("b1", "AREALSKU", 100, None), &mut uow)
            .await
            .unwrap();

        let result = allocate(&Allocate::new("o1", "NONEXISTENTSKU", 10), &mut uow).await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Invalid sku NONEXISTENTSKU");
        assert!(!uow.committed());
        let product = uow.store().load(&Sku::new("AREALSKU")).await.unwrap();
        assert_eq!(product.allocated_quantity(), 0);
    }

    #[tokio::test]
    async fn allocate_out_of_stock_commits_and_returns_none() {
        let mut uow = InMemoryUnitOfWork::default();
        add_batch(&CreateBatch::new("b1", "POPULAR-CURTAINS", 9, None), &mut uow)
            .await
            .unwrap();
        uow.collect_new_events();

        let result = allocate(&Allocate::new("o1", "POPULAR-CURTAINS", 10), &mut uow)
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(uow.committed());
        let events = uow.collect_new_events();
        assert!(matches!(events.as_slice(), [domain::Event::OutOfStock(_)]));
    }

    #[tokio::test]
    async fn change_batch_quantity_errors_for_unknown_batch() {
        let mut uow = InMemoryUnitOfWork::default();

        let result = change_batch_quantity(&ChangeBatchQuantity::new("nope", 5), &mut uow).await;

        assert!(matches!(result, Err(ServiceError::UnknownBatch(_))));
    }

    #[tokio::test]
    async fn handler_rejects_other_commands() {
        let mut uow = InMemoryUnitOfWork::default();
        let command: Command = Allocate::new("o1", "LAMP", 1).into();

        let result = CommandHandler::<InMemoryUnitOfWork>::handle(&AddBatchHandler, &command, &mut uow)
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::UnexpectedMessage {
                handler: "add_batch",
                message: "Allocate",
            })
        ));
    }
}
