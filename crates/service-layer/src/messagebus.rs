//! The message bus: routes commands and events to their handlers.

use std::collections::{HashMap, VecDeque};

use common::CorrelationId;
use domain::{Command, CommandKind, DomainEvent, Event, EventKind, Message};
use persistence::UnitOfWork;

use crate::handlers::{CommandHandler, CommandOutcome, EventHandler};
use crate::{Result, ServiceError};

/// Dispatches messages to handlers, cascading the events they raise.
///
/// One call to [`handle`](MessageBus::handle) processes a FIFO queue seeded
/// with the given message until it is empty:
///
/// - a command goes to exactly one handler; its error aborts the call and
///   is returned to the caller
/// - an event goes to every handler subscribed to it, in registration
///   order; a failing handler is logged and skipped
///
/// After every handler the events collected by the unit of work are pushed
/// to the back of the queue. Everything runs sequentially.
pub struct MessageBus<U: UnitOfWork> {
    uow: U,
    command_handlers: HashMap<CommandKind, Box<dyn CommandHandler<U>>>,
    event_handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<U>>>>,
}

impl<U: UnitOfWork> MessageBus<U> {
    /// Creates a bus with fixed routing tables.
    ///
    /// Command handlers are keyed by [`CommandHandler::kind`]; registering two
    /// handlers for the same kind keeps the last one.
    pub fn new(
        uow: U,
        command_handlers: Vec<Box<dyn CommandHandler<U>>>,
        event_handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<U>>>>,
    ) -> Self {
        let command_handlers = command_handlers
            .into_iter()
            .map(|handler| (handler.kind(), handler))
            .collect();
        Self {
            uow,
            command_handlers,
            event_handlers,
        }
    }

    /// The bus's unit of work.
    pub fn uow(&self) -> &U {
        &self.uow
    }

    /// Handles a message and everything it causes.
    ///
    /// Returns the outcome of every command processed, in order.
    #[tracing::instrument(skip(self, message), fields(correlation_id = %CorrelationId::new()))]
    pub async fn handle(&mut self, message: impl Into<Message> + Send) -> Result<Vec<CommandOutcome>> {
        let mut queue = VecDeque::from([message.into()]);
        let mut results = Vec::new();

        while let Some(message) = queue.pop_front() {
            match message {
                Message::Command(command) => {
                    let outcome = self.handle_command(&command, &mut queue).await?;
                    results.push(outcome);
                }
                Message::Event(event) => {
                    self.handle_event(&event, &mut queue).await;
                }
            }
        }

        Ok(results)
    }

    async fn handle_command(
        &mut self,
        command: &Command,
        queue: &mut VecDeque<Message>,
    ) -> Result<CommandOutcome> {
        tracing::debug!(command = %command.kind(), "handling command");

        let Some(handler) = self.command_handlers.get(&command.kind()) else {
            tracing::error!(command = %command.kind(), "no handler registered for command");
            return Err(ServiceError::NoHandler(command.kind()));
        };

        let result = handler.handle(command, &mut self.uow).await;
        if let Err(e) = &result {
            tracing::debug!(command = %command.kind(), error = %e, "command failed");
        }
        let outcome = result?;

        metrics::counter!("messagebus_commands_handled_total", "command" => command.kind().as_str())
            .increment(1);
        queue.extend(self.uow.collect_new_events().into_iter().map(Message::Event));
        Ok(outcome)
    }

    async fn handle_event(&mut self, event: &Event, queue: &mut VecDeque<Message>) {
        let Some(handlers) = self.event_handlers.get(&event.kind()) else {
            tracing::debug!(event = event.event_type(), "no handlers for event");
            return;
        };

        for handler in handlers {
            tracing::debug!(event = event.event_type(), handler = handler.name(), "handling event");
            match handler.handle(event, &mut self.uow).await {
                Ok(()) => {
                    metrics::counter!("messagebus_events_handled_total", "event" => event.event_type())
                        .increment(1);
                }
                Err(e) => {
                    metrics::counter!("messagebus_event_handler_failures_total", "handler" => handler.name())
                        .increment(1);
                    tracing::error!(
                        event = event.event_type(),
                        handler = handler.name(),
                        error = %e,
                        "exception handling event"
                    );
                }
            }
            queue.extend(self.uow.collect_new_events().into_iter().map(Message::Event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{
        AddBatchHandler, AllocateHandler, ChangeBatchQuantityHandler, ReallocateHandler,
    };
    use async_trait::async_trait;
    use domain::{Allocate, CreateBatch};
    use persistence::InMemoryUnitOfWork;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler<InMemoryUnitOfWork> for CountingHandler {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _event: &Event, _uow: &mut InMemoryUnitOfWork) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServiceError::UnknownBatch("boom".into()));
            }
            Ok(())
        }
    }

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<Event>>>,
    }

    #[async_trait]
    impl EventHandler<InMemoryUnitOfWork> for RecordingHandler {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn handle(&self, event: &Event, _uow: &mut InMemoryUnitOfWork) -> Result<()> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
            Ok(())
        }
    }

    fn bus_with(
        event_handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<InMemoryUnitOfWork>>>>,
    ) -> MessageBus<InMemoryUnitOfWork> {
        MessageBus::new(
            InMemoryUnitOfWork::default(),
            vec![Box::new(AddBatchHandler), Box::new(AllocateHandler)],
            event_handlers,
        )
    }

    #[tokio::test]
    async fn returns_command_outcomes() {
        let mut bus = bus_with(HashMap::new());

        let added = bus
            .handle(CreateBatch::new("b1", "LAMP", 10, None))
            .await
            .unwrap();
        let allocated = bus.handle(Allocate::new("o1", "LAMP", 2)).await.unwrap();

        assert_eq!(added, vec![CommandOutcome::BatchAdded]);
        assert_eq!(
            allocated,
            vec![CommandOutcome::Allocated {
                batch_ref: Some("b1".into())
            }]
        );
    }

    #[tokio::test]
    async fn unrouted_command_fails_with_no_handler() {
        let mut bus = bus_with(HashMap::new());

        let result = bus
            .handle(domain::ChangeBatchQuantity::new("b1", 5))
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::NoHandler(CommandKind::ChangeBatchQuantity))
        ));
    }

    #[tokio::test]
    async fn failing_event_handler_does_not_stop_the_others() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<InMemoryUnitOfWork>>>> =
            HashMap::new();
        handlers.insert(
            EventKind::Allocated,
            vec![
                Box::new(CountingHandler {
                    calls: calls.clone(),
                    fail: true,
                }),
                Box::new(CountingHandler {
                    calls: calls.clone(),
                    fail: false,
                }),
            ],
        );
        let mut bus = bus_with(handlers);
        bus.handle(CreateBatch::new("b1", "LAMP", 10, None))
            .await
            .unwrap();

        let result = bus.handle(Allocate::new("o1", "LAMP", 2)).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn events_without_handlers_are_dropped() {
        let mut bus = bus_with(HashMap::new());

        let result = bus
            .handle(domain::OutOfStock { sku: "LAMP".into() })
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn cascade_is_breadth_first() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<InMemoryUnitOfWork>>>> =
            HashMap::new();
        handlers.insert(
            EventKind::Deallocated,
            vec![
                Box::new(RecordingHandler { seen: seen.clone() }),
                Box::new(ReallocateHandler),
            ],
        );
        handlers.insert(
            EventKind::Allocated,
            vec![Box::new(RecordingHandler { seen: seen.clone() })],
        );
        let mut bus = MessageBus::new(
            InMemoryUnitOfWork::default(),
            vec![
                Box::new(AddBatchHandler),
                Box::new(AllocateHandler),
                Box::new(ChangeBatchQuantityHandler),
            ],
            handlers,
        );
        let later = chrono::NaiveDate::from_ymd_opt(2026, 1, 1);
        bus.handle(CreateBatch::new("b1", "LAMP", 20, None))
            .await
            .unwrap();
        bus.handle(CreateBatch::new("b2", "LAMP", 100, later))
            .await
            .unwrap();
        bus.handle(Allocate::new("o1", "LAMP", 10)).await.unwrap();
        bus.handle(Allocate::new("o2", "LAMP", 10)).await.unwrap();
        seen.lock().unwrap().clear();

        bus.handle(domain::ChangeBatchQuantity::new("b1", 0))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let kinds: Vec<EventKind> = seen.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Deallocated,
                EventKind::Deallocated,
                EventKind::Allocated,
                EventKind::Allocated,
            ]
        );
        for event in &seen[2..] {
            let Event::Allocated(data) = event else {
                unreachable!("checked above");
            };
            assert_eq!(data.batch_ref.as_str(), "b2");
        }
    }
}
