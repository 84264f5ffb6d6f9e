//! Service layer of the allocation service.
//!
//! Commands and events enter through the [`MessageBus`], which routes each
//! command to exactly one handler and each event to every handler
//! subscribed to it, collecting the events raised along the way until the
//! queue is empty. [`Bootstrap`] wires the bus to its collaborators.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod messagebus;
pub mod notifications;
pub mod publisher;

pub use bootstrap::Bootstrap;
pub use config::AllocationConfig;
pub use error::{Result, ServiceError};
pub use handlers::{CommandHandler, CommandOutcome, EventHandler};
pub use messagebus::MessageBus;
pub use notifications::{EmailNotifications, InMemoryNotifications, NotificationError, Notifications};
pub use publisher::{EventPublisher, LoggingPublisher};
