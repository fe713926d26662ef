//! Event store abstraction and the command execution service.
//!
//! The store persists ordered event streams keyed by a deterministic stream
//! UUID and guards appends with optimistic concurrency. [`CommandService`]
//! ties a store, a clock, and an aggregate together into the
//! read-decide-append loop, retrying on append conflicts against freshly
//! replayed state.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::clock::Clock;
use crate::error::ExecuteError;
use crate::projection::Projection;

/// Namespace for deterministic stream identity derivation.
const STREAM_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30,
    0xc8,
]);

/// Derive the stream UUID for an aggregate instance.
///
/// UUIDv5 of `"{aggregate_type}/{instance_id}"`, so the same logical
/// instance always maps to the same stream without coordination.
pub fn stream_uuid(aggregate_type: &str, instance_id: &str) -> Uuid {
    let name = format!("{aggregate_type}/{instance_id}");
    Uuid::new_v5(&STREAM_NAMESPACE, name.as_bytes())
}

/// Sequence expectation for an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedSequence {
    /// Append unconditionally.
    Any,
    /// Append only if the stream currently holds exactly this many events.
    Exact(u64),
}

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Another writer appended first.
    #[error("optimistic concurrency conflict: expected sequence {expected}, stream is at {actual}")]
    Conflict { expected: u64, actual: u64 },
}

/// Ordered, append-only storage of event streams.
///
/// The sequence number of a stream is the count of events it holds; a fresh
/// stream is at sequence 0.
pub trait EventStore<E>: Send + Sync {
    /// Read the full ordered history of a stream and its current sequence.
    fn replay(&self, stream_id: Uuid) -> (Vec<E>, u64);

    /// Append events to a stream.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if `expected` is `Exact(n)` and the stream
    /// is no longer at sequence `n`.
    fn append(
        &self,
        stream_id: Uuid,
        events: Vec<E>,
        expected: ExpectedSequence,
    ) -> Result<u64, StoreError>;
}

/// In-memory event store, suitable for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryEventStore<E> {
    streams: Mutex<HashMap<Uuid, Vec<E>>>,
}

impl<E> MemoryEventStore<E> {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }
}

impl<E: Clone + Send> EventStore<E> for MemoryEventStore<E> {
    fn replay(&self, stream_id: Uuid) -> (Vec<E>, u64) {
        let streams = self.streams.lock().expect("store mutex poisoned");
        match streams.get(&stream_id) {
            Some(events) => (events.clone(), events.len() as u64),
            None => (Vec::new(), 0),
        }
    }

    fn append(
        &self,
        stream_id: Uuid,
        events: Vec<E>,
        expected: ExpectedSequence,
    ) -> Result<u64, StoreError> {
        let mut streams = self.streams.lock().expect("store mutex poisoned");
        let stream = streams.entry(stream_id).or_default();
        let actual = stream.len() as u64;

        if let ExpectedSequence::Exact(expected) = expected {
            if actual != expected {
                return Err(StoreError::Conflict { expected, actual });
            }
        }

        stream.extend(events);
        Ok(stream.len() as u64)
    }
}

/// How many times a conflicted command is re-decided before giving up.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Executes commands against aggregate instances held in an event store.
///
/// Each execution replays the instance's stream, decides against the
/// reconstructed state at the clock's current instant, and appends the
/// produced events with an exact-sequence guard. A lost append race is
/// retried from a fresh replay, so a command is always decided against the
/// state it ends up recorded after.
pub struct CommandService<A, S>
where
    A: Aggregate,
    S: EventStore<A::DomainEvent>,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A, S> CommandService<A, S>
where
    A: Aggregate,
    A::Command: Clone,
    S: EventStore<A::DomainEvent>,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            _aggregate: PhantomData,
        }
    }

    /// Execute one command against the given instance.
    ///
    /// Returns the events recorded for this command; an accepted command
    /// that produces no events appends nothing.
    ///
    /// # Errors
    ///
    /// - [`ExecuteError::Domain`] when the decider rejects the command.
    /// - [`ExecuteError::Conflict`] when concurrent writers win the append
    ///   race on every retry.
    pub fn execute(
        &self,
        instance_id: &str,
        cmd: A::Command,
    ) -> Result<Vec<A::DomainEvent>, ExecuteError<A::Error>> {
        let stream_id = stream_uuid(A::AGGREGATE_TYPE, instance_id);
        let span = tracing::info_span!(
            "execute",
            aggregate_type = A::AGGREGATE_TYPE,
            instance_id,
            %stream_id,
        );
        let _guard = span.enter();

        for attempt in 0..=MAX_CONFLICT_RETRIES {
            let (history, sequence) = self.store.replay(stream_id);
            let state = crate::aggregate::replay::<A>(&history);

            let events = state
                .decide(cmd.clone(), self.clock.now())
                .map_err(ExecuteError::Domain)?;
            if events.is_empty() {
                return Ok(events);
            }

            match self.store.append(
                stream_id,
                events.clone(),
                ExpectedSequence::Exact(sequence),
            ) {
                Ok(_) => {
                    tracing::info!(count = events.len(), "events appended");
                    return Ok(events);
                }
                Err(StoreError::Conflict { expected, actual }) => {
                    tracing::warn!(attempt, expected, actual, "append conflict, retrying");
                }
            }
        }

        Err(ExecuteError::Conflict)
    }

    /// Reconstruct the instance's current write-model state.
    pub fn state(&self, instance_id: &str) -> A {
        let stream_id = stream_uuid(A::AGGREGATE_TYPE, instance_id);
        let (history, _) = self.store.replay(stream_id);
        crate::aggregate::replay(&history)
    }

    /// Build a read model over the instance's history.
    pub fn project<P>(&self, instance_id: &str) -> P
    where
        P: Projection<Event = A::DomainEvent>,
    {
        let stream_id = stream_uuid(A::AGGREGATE_TYPE, instance_id);
        let (history, _) = self.store.replay(stream_id);
        P::replay(&history)
    }
}
