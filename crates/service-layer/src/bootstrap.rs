//! Composition root: builds a message bus wired to its collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use domain::EventKind;
use persistence::{InMemoryUnitOfWork, UnitOfWork};
use projections::{AllocationsView, Projection};

use crate::config::AllocationConfig;
use crate::handlers::{
    AddBatchHandler, AllocateHandler, ChangeBatchQuantityHandler, CommandHandler, EventHandler,
    OutOfStockNotificationHandler, PublishAllocatedHandler, ReadModelHandler, ReallocateHandler,
};
use crate::messagebus::MessageBus;
use crate::notifications::{EmailNotifications, Notifications};
use crate::publisher::{EventPublisher, LoggingPublisher};

/// Builder for a [`MessageBus`].
///
/// Starts from production defaults (in-memory unit of work, SMTP
/// notifications, an empty allocations view and a logging publisher); each
/// can be replaced before [`build`](Bootstrap::build).
pub struct Bootstrap<U: UnitOfWork = InMemoryUnitOfWork> {
    config: AllocationConfig,
    uow: U,
    notifications: Arc<dyn Notifications>,
    allocations_view: AllocationsView,
    publisher: Arc<dyn EventPublisher>,
}

impl Bootstrap<InMemoryUnitOfWork> {
    pub fn new(config: AllocationConfig) -> Self {
        let notifications = Arc::new(EmailNotifications::new(&config));
        Self {
            config,
            uow: InMemoryUnitOfWork::default(),
            notifications,
            allocations_view: AllocationsView::new(),
            publisher: Arc::new(LoggingPublisher),
        }
    }
}

impl<U: UnitOfWork + 'static> Bootstrap<U> {
    /// Replaces the unit of work.
    pub fn with_unit_of_work<V: UnitOfWork>(self, uow: V) -> Bootstrap<V> {
        Bootstrap {
            config: self.config,
            uow,
            notifications: self.notifications,
            allocations_view: self.allocations_view,
            publisher: self.publisher,
        }
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn Notifications>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Replaces the allocations view, typically with a clone the caller keeps
    /// for queries.
    pub fn with_allocations_view(mut self, view: AllocationsView) -> Self {
        self.allocations_view = view;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Builds the bus with its routing tables.
    pub fn build(self) -> MessageBus<U> {
        let command_handlers: Vec<Box<dyn CommandHandler<U>>> = vec![
            Box::new(AddBatchHandler),
            Box::new(AllocateHandler),
            Box::new(ChangeBatchQuantityHandler),
        ];

        let mut event_handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<U>>>> =
            HashMap::new();
        event_handlers.insert(
            EventKind::Allocated,
            vec![Box::new(PublishAllocatedHandler::new(self.publisher))],
        );
        event_handlers.insert(EventKind::Deallocated, vec![Box::new(ReallocateHandler)]);
        event_handlers.insert(
            EventKind::OutOfStock,
            vec![Box::new(OutOfStockNotificationHandler::new(
                self.notifications,
                self.config.out_of_stock_recipient,
            ))],
        );

        // Read models run after the handlers above for the same event.
        let read_model: Arc<dyn Projection> = Arc::new(self.allocations_view);
        for kind in read_model.subscribes_to() {
            event_handlers
                .entry(*kind)
                .or_default()
                .push(Box::new(ReadModelHandler::new(read_model.clone())));
        }

        tracing::debug!("message bus built");
        MessageBus::new(self.uow, command_handlers, event_handlers)
    }
}
