//! The read-side contract shared by every view.

use async_trait::async_trait;
use domain::{Event, EventKind};

/// A read model kept up to date from committed allocation events.
///
/// The message bus subscribes a projection to exactly the kinds it lists in
/// [`subscribes_to`](Projection::subscribes_to). Applying an event is
/// infallible: a view only rearranges rows it already holds.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Event kinds this projection wants to see.
    fn subscribes_to(&self) -> &'static [EventKind];

    /// Applies one event to the read model.
    async fn apply(&self, event: &Event);

    /// Number of events applied so far.
    async fn events_applied(&self) -> u64;
}
