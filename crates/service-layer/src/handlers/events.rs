//! Event handlers.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Allocate, DomainEvent, Event};
use persistence::UnitOfWork;
use projections::Projection;

use super::EventHandler;
use super::commands::allocate;
use crate::notifications::Notifications;
use crate::publisher::{EventPublisher, LINE_ALLOCATED_CHANNEL};
use crate::{Result, ServiceError};

fn unexpected(handler: &'static str, event: &Event) -> ServiceError {
    ServiceError::UnexpectedMessage {
        handler,
        message: event.event_type(),
    }
}

/// Finds a new batch for a line released by a quantity change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReallocateHandler;

#[async_trait]
impl<U: UnitOfWork> EventHandler<U> for ReallocateHandler {
    fn name(&self) -> &'static str {
        "reallocate"
    }

    async fn handle(&self, event: &Event, uow: &mut U) -> Result<()> {
        let Event::Deallocated(data) = event else {
            return Err(unexpected(EventHandler::<U>::name(self), event));
        };
        let cmd = Allocate::new(data.order_id.clone(), data.sku.clone(), data.qty);
        allocate(&cmd, uow).await?;
        Ok(())
    }
}

/// Tells the stock team a product ran out.
pub struct OutOfStockNotificationHandler {
    notifications: Arc<dyn Notifications>,
    destination: String,
}

impl OutOfStockNotificationHandler {
    pub fn new(notifications: Arc<dyn Notifications>, destination: impl Into<String>) -> Self {
        Self {
            notifications,
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> EventHandler<U> for OutOfStockNotificationHandler {
    fn name(&self) -> &'static str {
        "send_out_of_stock_notification"
    }

    async fn handle(&self, event: &Event, _uow: &mut U) -> Result<()> {
        let Event::OutOfStock(data) = event else {
            return Err(unexpected(EventHandler::<U>::name(self), event));
        };
        metrics::counter!("out_of_stock_total").increment(1);
        self.notifications
            .send(&self.destination, &format!("Out of stock for {}", data.sku))
            .await?;
        Ok(())
    }
}

/// Hands allocations to the outbound publisher.
pub struct PublishAllocatedHandler {
    publisher: Arc<dyn EventPublisher>,
}

impl PublishAllocatedHandler {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<U: UnitOfWork> EventHandler<U> for PublishAllocatedHandler {
    fn name(&self) -> &'static str {
        "publish_allocated_event"
    }

    async fn handle(&self, event: &Event, _uow: &mut U) -> Result<()> {
        if !matches!(event, Event::Allocated(_)) {
            return Err(unexpected(EventHandler::<U>::name(self), event));
        }
        self.publisher.publish(LINE_ALLOCATED_CHANNEL, event).await
    }
}

/// Keeps a read model in step with allocations.
pub struct ReadModelHandler {
    projection: Arc<dyn Projection>,
}

impl ReadModelHandler {
    pub fn new(projection: Arc<dyn Projection>) -> Self {
        Self { projection }
    }
}

#[async_trait]
impl<U: UnitOfWork> EventHandler<U> for ReadModelHandler {
    fn name(&self) -> &'static str {
        self.projection.name()
    }

    async fn handle(&self, event: &Event, _uow: &mut U) -> Result<()> {
        if !self.projection.subscribes_to().contains(&event.kind()) {
            return Err(unexpected(EventHandler::<U>::name(self), event));
        }
        self.projection.apply(event).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::InMemoryNotifications;
    use domain::{Deallocated, OutOfStock};
    use persistence::InMemoryUnitOfWork;
    use projections::AllocationsView;

    #[tokio::test]
    async fn out_of_stock_sends_notification_with_sku() {
        let notifications = InMemoryNotifications::new();
        let handler =
            OutOfStockNotificationHandler::new(Arc::new(notifications.clone()), "stock@example.com");
        let mut uow = InMemoryUnitOfWork::default();

        EventHandler::handle(
            &handler,
            &OutOfStock {
                sku: "POPULAR-CURTAINS".into(),
            }
            .into(),
            &mut uow,
        )
        .await
        .unwrap();

        assert_eq!(
            notifications.sent_to("stock@example.com"),
            vec!["Out of stock for POPULAR-CURTAINS"]
        );
    }

    #[tokio::test]
    async fn notification_failure_is_reported() {
        let notifications = InMemoryNotifications::new();
        notifications.set_fail_on_send(true);
        let handler = OutOfStockNotificationHandler::new(Arc::new(notifications), "x@example.com");
        let mut uow = InMemoryUnitOfWork::default();

        let result =
            EventHandler::handle(&handler, &OutOfStock { sku: "SKU".into() }.into(), &mut uow)
                .await;

        assert!(matches!(result, Err(ServiceError::Notification(_))));
    }

    #[tokio::test]
    async fn reallocate_rejects_other_events() {
        let mut uow = InMemoryUnitOfWork::default();

        let result = EventHandler::handle(
            &ReallocateHandler,
            &OutOfStock { sku: "SKU".into() }.into(),
            &mut uow,
        )
        .await;

        assert!(matches!(
            result,
            Err(ServiceError::UnexpectedMessage {
                handler: "reallocate",
                message: "OutOfStock",
            })
        ));
    }

    #[tokio::test]
    async fn read_model_handler_forwards_to_projection() {
        let view = AllocationsView::new();
        let handler = ReadModelHandler::new(Arc::new(view.clone()));
        let mut uow = InMemoryUnitOfWork::default();

        EventHandler::handle(
            &handler,
            &Deallocated {
                order_id: "o1".into(),
                sku: "LAMP".into(),
                qty: 1,
            }
            .into(),
            &mut uow,
        )
        .await
        .unwrap();

        assert_eq!(view.events_applied().await, 1);
        assert_eq!(EventHandler::<InMemoryUnitOfWork>::name(&handler), "AllocationsView");
    }

    #[tokio::test]
    async fn read_model_handler_rejects_unsubscribed_events() {
        let view = AllocationsView::new();
        let handler = ReadModelHandler::new(Arc::new(view.clone()));
        let mut uow = InMemoryUnitOfWork::default();

        let result =
            EventHandler::handle(&handler, &OutOfStock { sku: "SKU".into() }.into(), &mut uow)
                .await;

        assert!(matches!(
            result,
            Err(ServiceError::UnexpectedMessage {
                handler: "AllocationsView",
                message: "OutOfStock",
            })
        ));
        assert_eq!(view.events_applied().await, 0);
    }
}
