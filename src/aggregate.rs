//! Aggregate trait: the decider/evolver contract.

use chrono::{DateTime, FixedOffset};
use serde::{de::DeserializeOwned, Serialize};

/// A domain aggregate whose state is derived from its event history.
///
/// The implementing type itself serves as the aggregate's state. State is
/// built by folding domain events through [`evolve`](Aggregate::evolve).
///
/// # Associated Types
///
/// - `Command`: the set of commands this aggregate can handle.
/// - `DomainEvent`: the set of events this aggregate can produce and apply.
/// - `Error`: command rejection error.
///
/// # Contract
///
/// - [`decide`](Aggregate::decide) must be a pure decision function: no I/O,
///   no side effects, no clock reads beyond the `now` it is handed. It
///   validates a command against the current state and returns either a
///   complete batch of events or an error, never a partial batch.
/// - [`evolve`](Aggregate::evolve) must be a pure, total function. It takes
///   ownership of the current state and a reference to a domain event,
///   returning the next state. It never fails: every recorded event was
///   accepted by a past `decide` and must apply cleanly on replay.
/// - Together they form a closed loop: replaying the full ordered history
///   through `evolve` from `Default` reproduces exactly the state `decide`
///   observed when each event was produced. The only nondeterminism is the
///   injected `now`, and that is captured inside the events themselves.
pub trait Aggregate:
    Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Identifies this aggregate type (e.g. "account"). Used for stream
    /// identity derivation.
    const AGGREGATE_TYPE: &'static str;

    /// The set of commands this aggregate can handle.
    type Command: Send + 'static;

    /// The set of events this aggregate can produce and apply.
    type DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + 'static;

    /// Command rejection error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate a command against the current state and produce events.
    ///
    /// `now` is the instant the command is being decided at, supplied by the
    /// caller's [`Clock`](crate::Clock). Structural validation (positive
    /// amounts, enum membership) happens before `decide` is invoked; only
    /// state-dependent rules are enforced here.
    ///
    /// # Errors
    ///
    /// Returns `Err` to reject the command; no events are produced.
    fn decide(
        &self,
        cmd: Self::Command,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<Self::DomainEvent>, Self::Error>;

    /// Apply a single event to produce the next state.
    fn evolve(self, event: &Self::DomainEvent) -> Self;
}

/// Rebuild an aggregate by folding its full ordered history from `Default`.
pub fn replay<A: Aggregate>(events: &[A::DomainEvent]) -> A {
    events
        .iter()
        .fold(A::default(), |state, event| state.evolve(event))
}
