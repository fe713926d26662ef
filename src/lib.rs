//! Event-sourced personal-finance ledger core.
//!
//! Accounts are append-only event streams. A pure decider validates
//! commands against state reconstructed by folding the stream, and an
//! optional withdraw policy caps how much can leave the account within one
//! budget period (minute, daily, weekly, or monthly). Two read models
//! answer queries: the running balance and the current period's activity.
//!
//! The crate is deliberately transport- and storage-agnostic: the
//! [`EventStore`] trait seams out persistence (an in-memory store ships for
//! tests and embedding), the [`Clock`] trait seams out time, and the
//! [`Router`] exposes tag-addressed operations for whatever wire an
//! embedder runs.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use ledgerfold::{ManualClock, MemoryEventStore, Router};
//!
//! let start = Utc.with_ymd_and_hms(2019, 5, 3, 12, 20, 30).unwrap().fixed_offset();
//! let router = Router::new(
//!     Arc::new(MemoryEventStore::new()),
//!     Arc::new(ManualClock::new(start)),
//! );
//!
//! router.dispatch("alice", "deposit-funds", br#"{"amount": "30"}"#)?;
//! let balance = router.dispatch("alice", "balance", b"")?;
//! assert_eq!(balance, br#"{"amount":"30"}"#);
//! # Ok::<(), ledgerfold::DispatchError>(())
//! ```

pub mod account;
pub mod aggregate;
pub mod clock;
pub mod error;
pub mod period;
pub mod projection;
pub mod projections;
pub mod registry;
pub mod router;
pub mod store;

pub use account::{Account, AccountCommand, AccountError, AccountEvent, WithdrawPolicy};
pub use aggregate::{replay, Aggregate};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ExecuteError, ValidationError};
pub use period::{period_window, Period};
pub use projection::Projection;
pub use projections::{CurrentFunds, PeriodSummary};
pub use registry::{
    decode_command, decode_event, encode_event, RegistryError, COMMAND_TAGS, EVENT_TAGS,
};
pub use router::{DispatchError, Router};
pub use store::{
    stream_uuid, CommandService, EventStore, ExpectedSequence, MemoryEventStore, StoreError,
};
