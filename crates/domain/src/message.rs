//! The unit of work queued by the message bus.

use crate::commands::{Allocate, ChangeBatchQuantity, Command, CreateBatch};
use crate::events::{Allocated, Deallocated, Event, OutOfStock};

/// Either a command or an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}

macro_rules! message_from {
    ($($ty:ty => $wrap:ident),* $(,)?) => {
        $(
            impl From<$ty> for Message {
                fn from(value: $ty) -> Self {
                    Message::$wrap(value.into())
                }
            }
        )*
    };
}

message_from! {
    CreateBatch => Command,
    Allocate => Command,
    ChangeBatchQuantity => Command,
    Allocated => Event,
    Deallocated => Event,
    OutOfStock => Event,
}
