//! Projection trait: fold events into a read model.

use serde::{de::DeserializeOwned, Serialize};

/// A read model built by folding domain events.
///
/// Unlike the write-model fold in [`Aggregate::evolve`], a projection only
/// consumes events; it never decides anything. Each projection keeps just
/// the fields its query needs and ignores events that do not concern it.
///
/// # Contract
///
/// - `apply` must be pure and total: no I/O, no failures, every event the
///   aggregate can record applies cleanly.
/// - Replaying the same ordered history always produces the same state.
///
/// [`Aggregate::evolve`]: crate::Aggregate::evolve
pub trait Projection:
    Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Identifies this projection (e.g. "balance"). Doubles as the query
    /// operation name at the dispatch edge.
    const NAME: &'static str;

    /// The event type this projection consumes.
    type Event;

    /// Fold one event into the read model.
    fn apply(&mut self, event: &Self::Event);

    /// Build the read model from an ordered event history.
    fn replay<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        let mut model = Self::default();
        for event in events {
            model.apply(event);
        }
        model
    }
}
