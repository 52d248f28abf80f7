//! The storage trait every backend implements.

use async_trait::async_trait;

use crate::error::Result;
use crate::filter::{Filter, Reducer};
use crate::model::{Aggregate, Event};

/// A subject-addressed event store.
///
/// Implementations must guarantee:
/// - pushes are atomic across all aggregates of a call
/// - per-aggregate sequences start at 1 and are gap-free
/// - filter delivery order is the global creation order, with events of
///   the same push ordered as they were submitted
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Whether the backend can currently accept calls.
    async fn ready(&self) -> Result<()>;

    /// Append all commands of all aggregates in one atomic step.
    ///
    /// Returns the stored events in submission order, with sequences and
    /// timestamps assigned. If any aggregate's `current_sequence`
    /// expectation fails, nothing is written and
    /// [`Error::SequenceNotMatched`](crate::Error::SequenceNotMatched)
    /// is returned.
    async fn push(&self, aggregates: &[Aggregate]) -> Result<Vec<Event>>;

    /// Stream every event matching `filter` into `reducer`, in global
    /// order. An empty query list yields no events.
    async fn filter(&self, filter: &Filter, reducer: &mut dyn Reducer) -> Result<()>;
}
