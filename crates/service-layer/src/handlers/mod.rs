//! Command and event handlers.
//!
//! Handlers are trait objects built once at bootstrap. Each one captures the
//! collaborators it needs; the unit of work is the only thing handed to it
//! per call, so every handler in a cascade shares the bus's transaction
//! boundary.

pub mod commands;
pub mod events;

use async_trait::async_trait;
use common::BatchReference;
use domain::{Command, CommandKind, Event};
use persistence::UnitOfWork;

use crate::Result;

pub use commands::{
    AddBatchHandler, AllocateHandler, ChangeBatchQuantityHandler, add_batch, allocate,
    change_batch_quantity,
};
pub use events::{
    OutOfStockNotificationHandler, PublishAllocatedHandler, ReadModelHandler, ReallocateHandler,
};

/// What a command handler reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    BatchAdded,
    /// `batch_ref` is `None` when no batch could take the line.
    Allocated {
        batch_ref: Option<BatchReference>,
    },
    BatchQuantityChanged,
}

impl CommandOutcome {
    /// The batch an `Allocate` command landed in, if any.
    pub fn batch_ref(&self) -> Option<&BatchReference> {
        match self {
            CommandOutcome::Allocated { batch_ref } => batch_ref.as_ref(),
            _ => None,
        }
    }
}

/// Handles one kind of command.
#[async_trait]
pub trait CommandHandler<U: UnitOfWork>: Send + Sync {
    /// The command kind this handler is registered for.
    fn kind(&self) -> CommandKind;

    async fn handle(&self, command: &Command, uow: &mut U) -> Result<CommandOutcome>;
}

/// Reacts to an event.
#[async_trait]
pub trait EventHandler<U: UnitOfWork>: Send + Sync {
    /// Name used in logs when the handler fails.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &Event, uow: &mut U) -> Result<()>;
}
