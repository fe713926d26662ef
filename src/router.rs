//! Operation router: the dispatch edge of the ledger core.
//!
//! Maps wire operations onto the command service. Command operations are
//! named by their command tags; query operations are named by the
//! projection they answer from. Embedders wire this router behind whatever
//! transport they run.

use std::sync::Arc;

use crate::account::{Account, AccountError, AccountEvent};
use crate::clock::Clock;
use crate::error::{ExecuteError, ValidationError};
use crate::projection::Projection;
use crate::projections::{CurrentFunds, PeriodSummary};
use crate::registry::{self, RegistryError, COMMAND_TAGS};
use crate::store::{CommandService, EventStore};

/// Dispatch failures, ordered by pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The operation names neither a command nor a query.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    /// The payload did not decode into the operation's command.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The command failed structural validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The command was rejected by the aggregate or lost the append race.
    #[error(transparent)]
    Execute(#[from] ExecuteError<AccountError>),
    /// A query result failed to serialize.
    #[error("encoding response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Routes account operations to the command service.
pub struct Router<S>
where
    S: EventStore<AccountEvent>,
{
    service: CommandService<Account, S>,
}

impl<S> Router<S>
where
    S: EventStore<AccountEvent>,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service: CommandService::new(store, clock),
        }
    }

    /// Dispatch one operation against an account.
    ///
    /// Command operations return an empty payload on success; query
    /// operations return the projection serialized as JSON.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`]; a failed command records no events.
    pub fn dispatch(
        &self,
        account: &str,
        operation: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, DispatchError> {
        let span = tracing::info_span!("dispatch", account, operation);
        let _guard = span.enter();

        if COMMAND_TAGS.contains(&operation) {
            let cmd = registry::decode_command(operation, payload)?;
            cmd.validate()?;
            self.service.execute(account, cmd)?;
            return Ok(Vec::new());
        }

        match operation {
            CurrentFunds::NAME => {
                let model: CurrentFunds = self.service.project(account);
                Ok(serde_json::to_vec(&model)?)
            }
            PeriodSummary::NAME => {
                let model: PeriodSummary = self.service.project(account);
                Ok(serde_json::to_vec(&model)?)
            }
            other => Err(DispatchError::UnknownOperation(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryEventStore;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::Value;

    fn router() -> Router<MemoryEventStore<AccountEvent>> {
        let start = Utc
            .with_ymd_and_hms(2019, 5, 3, 12, 20, 30)
            .unwrap()
            .fixed_offset();
        Router::new(
            Arc::new(MemoryEventStore::new()),
            Arc::new(ManualClock::new(start)),
        )
    }

    #[test]
    fn command_operations_return_empty_payloads() {
        let router = router();
        let out = router
            .dispatch("alice", "deposit-funds", br#"{"amount": "30"}"#)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn balance_query_reflects_commands() {
        let router = router();
        router
            .dispatch("alice", "deposit-funds", br#"{"amount": "30"}"#)
            .unwrap();
        router
            .dispatch("alice", "withdraw-funds", br#"{"amount": "10"}"#)
            .unwrap();

        let out = router.dispatch("alice", "balance", b"").unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["amount"], "20");
    }

    #[test]
    fn balance_is_the_query_operations_wire_name() {
        let router = router();
        router
            .dispatch("alice", "deposit-funds", br#"{"amount": "30"}"#)
            .unwrap();

        let out = router.dispatch("alice", "balance", b"").unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["amount"], "30");
    }

    #[test]
    fn period_summary_query_reflects_policy() {
        let router = router();
        router
            .dispatch("alice", "deposit-funds", br#"{"amount": "30"}"#)
            .unwrap();
        router
            .dispatch(
                "alice",
                "set-withdraw-policy",
                br#"{"max_amount": "10", "period": "daily"}"#,
            )
            .unwrap();
        router
            .dispatch("alice", "withdraw-funds", br#"{"amount": "7"}"#)
            .unwrap();

        let out = router.dispatch("alice", "period-summary", b"").unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["policy_period"], "daily");
        assert_eq!(value["withdrawals_in_period"], 1);
        assert_eq!(value["funds_withdrawn_in_period"], "7");
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let router = router();
        let err = router.dispatch("alice", "close-account", b"").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownOperation(op) if op == "close-account"));
    }

    #[test]
    fn invalid_amounts_are_rejected_before_execution() {
        let router = router();
        let err = router
            .dispatch("alice", "deposit-funds", br#"{"amount": "0"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Validation(ValidationError::NonPositiveAmount)
        ));

        // Nothing was recorded.
        let out = router.dispatch("alice", "balance", b"").unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["amount"], "0");
    }

    #[test]
    fn domain_rejections_surface_through_dispatch() {
        let router = router();
        let err = router
            .dispatch("alice", "withdraw-funds", br#"{"amount": "10"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Execute(ExecuteError::Domain(AccountError::InsufficientFunds))
        ));
    }
}
