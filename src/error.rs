//! Error types shared across the command pipeline.

/// Structural command validation failure.
///
/// Raised at the dispatch edge, before a command reaches the aggregate's
/// decider. Rules that depend on aggregate state belong in the decider's
/// own error type instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Deposits and withdrawals must move a strictly positive amount.
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    /// A withdraw policy's maximum may be zero (forbidding withdrawals)
    /// but never negative.
    #[error("maximum withdraw amount must not be negative")]
    NegativeMaxAmount,
}

/// Failure executing a command against an aggregate instance.
///
/// Domain rejections pass through transparently so callers can match on
/// the aggregate's own error type.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The aggregate's decider rejected the command.
    #[error(transparent)]
    Domain(E),

    /// Concurrent writers kept winning the append race. The command was
    /// retried against fresh state each time and never applied.
    #[error("optimistic concurrency conflict: retries exhausted")]
    Conflict,
}
