//! Account aggregate -- decides whether withdrawals are allowed.
//!
//! The account tracks its current funds and an optional withdraw policy
//! capping how much can be taken out of the account within one budget
//! period. Deposits and policy changes are always accepted; the interesting
//! decision is [`AccountCommand::WithdrawFunds`], which must respect both
//! the balance floor and the per-period cap.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::ValidationError;
use crate::period::{period_window, Period};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Write-model state of a single account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Current balance. Never negative.
    pub current_funds: Decimal,
    /// Active withdraw policy, if one has been set.
    ///
    /// The policy fields are all-or-nothing: either a policy is active with
    /// a complete window, or there is none.
    pub policy: Option<WithdrawPolicy>,
}

/// An active per-period withdrawal cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawPolicy {
    /// Maximum total that may be withdrawn within one period.
    ///
    /// A zero maximum is legal and forbids all withdrawals while the
    /// policy is active.
    pub max_withdraw_amount: Decimal,
    /// Granularity of the budget period.
    pub period: Period,
    /// Start of the current period window.
    pub period_start_time: DateTime<FixedOffset>,
    /// Start of the next period window.
    pub next_period_start_time: DateTime<FixedOffset>,
    /// Total withdrawn so far in the current period. Resets exactly at a
    /// period-boundary crossing.
    pub funds_withdrawn_in_period: Decimal,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands accepted by the [`Account`] aggregate.
///
/// Wire tags are the kebab-case variant names (`deposit-funds`, ...), used
/// by the type registry for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum AccountCommand {
    /// Add funds to the account.
    DepositFunds {
        amount: Decimal,
        #[serde(default)]
        description: String,
    },
    /// Take funds out of the account, subject to balance and policy.
    WithdrawFunds {
        amount: Decimal,
        #[serde(default)]
        description: String,
    },
    /// Install (or replace) the per-period withdrawal cap.
    SetWithdrawPolicy { max_amount: Decimal, period: Period },
    /// Remove the active withdrawal cap.
    RemoveWithdrawPolicy,
}

impl AccountCommand {
    /// Structural validation, run before the command reaches
    /// [`Aggregate::decide`]. State-dependent rules live in the decider.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NonPositiveAmount`] for a deposit or withdrawal
    ///   of zero or less.
    /// - [`ValidationError::NegativeMaxAmount`] for a policy with a negative
    ///   maximum. A zero maximum passes: it forbids all withdrawals.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            AccountCommand::DepositFunds { amount, .. }
            | AccountCommand::WithdrawFunds { amount, .. } => {
                if *amount <= Decimal::ZERO {
                    return Err(ValidationError::NonPositiveAmount);
                }
                Ok(())
            }
            AccountCommand::SetWithdrawPolicy { max_amount, .. } => {
                if *max_amount < Decimal::ZERO {
                    return Err(ValidationError::NegativeMaxAmount);
                }
                Ok(())
            }
            AccountCommand::RemoveWithdrawPolicy => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Domain events produced by the [`Account`] aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum AccountEvent {
    /// Funds were added to the account.
    FundsDeposited {
        amount: Decimal,
        description: String,
        time: DateTime<FixedOffset>,
    },
    /// Funds were taken out of the account.
    FundsWithdrawn {
        amount: Decimal,
        description: String,
        time: DateTime<FixedOffset>,
        /// Whether this withdrawal crossed into a new period window.
        ///
        /// Decided exactly once, at decide time, against the injected clock.
        /// Evolvers trust the flag and never recompute it from the wall
        /// clock, so replay produces identical state on any later day.
        period_changed: bool,
    },
    /// A withdraw policy was installed with its window pre-filled.
    WithdrawPolicySet {
        max_withdraw_amount: Decimal,
        period: Period,
        policy_start_time: DateTime<FixedOffset>,
        period_start_time: DateTime<FixedOffset>,
        next_period_start_time: DateTime<FixedOffset>,
    },
    /// The withdraw policy was removed.
    WithdrawPolicyRemoved { time: DateTime<FixedOffset> },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Business-rule errors returned by the [`Account`] decider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// The withdrawal would drive the balance below zero.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// The withdrawal would exceed the maximum amount allowed in the
    /// current budget period.
    #[error("withdrawal would exceed max amount allowed in current period")]
    ExceedsPeriodLimit,
}

// ---------------------------------------------------------------------------
// Aggregate impl
// ---------------------------------------------------------------------------

impl Aggregate for Account {
    const AGGREGATE_TYPE: &'static str = "account";
    type Command = AccountCommand;
    type DomainEvent = AccountEvent;
    type Error = AccountError;

    fn decide(
        &self,
        cmd: AccountCommand,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        match cmd {
            // Deposits are unconditional: command validation has already
            // checked the amount is positive.
            AccountCommand::DepositFunds {
                amount,
                description,
            } => Ok(vec![AccountEvent::FundsDeposited {
                amount,
                description,
                time: now,
            }]),

            AccountCommand::WithdrawFunds {
                amount,
                description,
            } => {
                // The balance must never go below zero.
                if self.current_funds - amount < Decimal::ZERO {
                    return Err(AccountError::InsufficientFunds);
                }

                let mut period_changed = false;

                if let Some(policy) = &self.policy {
                    period_changed = now >= policy.next_period_start_time;

                    // Inside the current window the per-period cap applies.
                    if !period_changed
                        && policy.funds_withdrawn_in_period + amount > policy.max_withdraw_amount
                    {
                        return Err(AccountError::ExceedsPeriodLimit);
                    }
                }

                Ok(vec![AccountEvent::FundsWithdrawn {
                    amount,
                    description,
                    time: now,
                    period_changed,
                }])
            }

            AccountCommand::SetWithdrawPolicy { max_amount, period } => {
                let (period_start_time, next_period_start_time) = period_window(&now, period);

                Ok(vec![AccountEvent::WithdrawPolicySet {
                    max_withdraw_amount: max_amount,
                    period,
                    policy_start_time: now,
                    period_start_time,
                    next_period_start_time,
                }])
            }

            AccountCommand::RemoveWithdrawPolicy => {
                Ok(vec![AccountEvent::WithdrawPolicyRemoved { time: now }])
            }
        }
    }

    fn evolve(mut self, event: &AccountEvent) -> Self {
        match event {
            AccountEvent::FundsDeposited { amount, .. } => {
                self.current_funds += *amount;
            }

            AccountEvent::FundsWithdrawn {
                amount,
                time,
                period_changed,
                ..
            } => {
                self.current_funds -= *amount;

                if let Some(policy) = self.policy.as_mut() {
                    if *period_changed {
                        // First withdrawal of a fresh window: the window is
                        // re-derived from the event's own timestamp, not
                        // from the clock at replay time.
                        policy.funds_withdrawn_in_period = *amount;
                        let (start, next) = period_window(time, policy.period);
                        policy.period_start_time = start;
                        policy.next_period_start_time = next;
                    } else {
                        policy.funds_withdrawn_in_period += *amount;
                    }
                }
            }

            AccountEvent::WithdrawPolicySet {
                max_withdraw_amount,
                period,
                period_start_time,
                next_period_start_time,
                ..
            } => {
                self.policy = Some(WithdrawPolicy {
                    max_withdraw_amount: *max_withdraw_amount,
                    period: *period,
                    period_start_time: *period_start_time,
                    next_period_start_time: *next_period_start_time,
                    funds_withdrawn_in_period: Decimal::ZERO,
                });
            }

            AccountEvent::WithdrawPolicyRemoved { .. } => {
                self.policy = None;
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2019, 5, 3, 12, 20, 30)
            .unwrap()
            .fixed_offset()
    }

    fn deposit(amount: Decimal) -> AccountCommand {
        AccountCommand::DepositFunds {
            amount,
            description: String::new(),
        }
    }

    fn withdraw(amount: Decimal) -> AccountCommand {
        AccountCommand::WithdrawFunds {
            amount,
            description: String::new(),
        }
    }

    /// Decide and fold the produced events in one step.
    fn step(account: Account, cmd: AccountCommand, at: DateTime<FixedOffset>) -> Account {
        let events = account.decide(cmd, at).expect("command should be accepted");
        events
            .iter()
            .fold(account, |state, event| state.evolve(event))
    }

    #[test]
    fn deposit_is_always_accepted() {
        let account = Account::default();
        let events = account.decide(deposit(dec!(10)), now()).unwrap();
        assert_eq!(
            events,
            vec![AccountEvent::FundsDeposited {
                amount: dec!(10),
                description: String::new(),
                time: now(),
            }]
        );

        let account = step(account, deposit(dec!(10)), now());
        let account = step(account, deposit(dec!(20)), now());
        assert_eq!(account.current_funds, dec!(30));
    }

    #[test]
    fn withdraw_from_empty_account_fails_with_no_events() {
        let account = Account::default();
        let err = account.decide(withdraw(dec!(10)), now()).unwrap_err();
        assert_eq!(err, AccountError::InsufficientFunds);
        assert_eq!(account, Account::default(), "decide must not mutate state");
    }

    #[test]
    fn withdraw_down_to_exactly_zero_succeeds() {
        let account = step(Account::default(), deposit(dec!(10)), now());
        let account = step(account, withdraw(dec!(10)), now());
        assert_eq!(account.current_funds, Decimal::ZERO);
    }

    #[test]
    fn withdrawal_without_policy_carries_no_period_change() {
        let account = step(Account::default(), deposit(dec!(10)), now());
        let events = account.decide(withdraw(dec!(5)), now()).unwrap();
        assert_eq!(
            events,
            vec![AccountEvent::FundsWithdrawn {
                amount: dec!(5),
                description: String::new(),
                time: now(),
                period_changed: false,
            }]
        );
    }

    #[test]
    fn set_policy_prefills_the_window() {
        let account = Account::default();
        let events = account
            .decide(
                AccountCommand::SetWithdrawPolicy {
                    max_amount: dec!(10),
                    period: Period::Minute,
                },
                now(),
            )
            .unwrap();

        let (start, next) = period_window(&now(), Period::Minute);
        assert_eq!(
            events,
            vec![AccountEvent::WithdrawPolicySet {
                max_withdraw_amount: dec!(10),
                period: Period::Minute,
                policy_start_time: now(),
                period_start_time: start,
                next_period_start_time: next,
            }]
        );

        let account = account.evolve(&events[0]);
        let policy = account.policy.expect("policy should be active");
        assert_eq!(policy.funds_withdrawn_in_period, Decimal::ZERO);
        assert_eq!(policy.period_start_time, start);
        assert_eq!(policy.next_period_start_time, next);
    }

    #[test]
    fn policy_caps_withdrawals_within_the_period() {
        let account = step(Account::default(), deposit(dec!(30)), now());
        let account = step(
            account,
            AccountCommand::SetWithdrawPolicy {
                max_amount: dec!(10),
                period: Period::Minute,
            },
            now(),
        );

        let account = step(account, withdraw(dec!(10)), now());
        assert_eq!(account.current_funds, dec!(20));

        // Same instant, cap already spent.
        let err = account.decide(withdraw(dec!(10)), now()).unwrap_err();
        assert_eq!(err, AccountError::ExceedsPeriodLimit);
    }

    #[test]
    fn period_rollover_resets_the_cap() {
        let account = step(Account::default(), deposit(dec!(30)), now());
        let account = step(
            account,
            AccountCommand::SetWithdrawPolicy {
                max_amount: dec!(10),
                period: Period::Minute,
            },
            now(),
        );
        let account = step(account, withdraw(dec!(10)), now());

        // 24 hours later the minute window has long rolled over.
        let later = now() + Duration::hours(24);
        let events = account.decide(withdraw(dec!(10)), later).unwrap();
        assert_eq!(
            events,
            vec![AccountEvent::FundsWithdrawn {
                amount: dec!(10),
                description: String::new(),
                time: later,
                period_changed: true,
            }]
        );

        let account = account.evolve(&events[0]);
        assert_eq!(account.current_funds, dec!(10));

        let policy = account.policy.as_ref().expect("policy still active");
        assert_eq!(policy.funds_withdrawn_in_period, dec!(10));
        let (start, next) = period_window(&later, Period::Minute);
        assert_eq!(policy.period_start_time, start);
        assert_eq!(policy.next_period_start_time, next);

        // The fresh window's cap is spent again.
        let err = account.decide(withdraw(dec!(10)), later).unwrap_err();
        assert_eq!(err, AccountError::ExceedsPeriodLimit);
    }

    #[test]
    fn removing_the_policy_lifts_the_cap() {
        let account = step(Account::default(), deposit(dec!(30)), now());
        let account = step(
            account,
            AccountCommand::SetWithdrawPolicy {
                max_amount: dec!(10),
                period: Period::Minute,
            },
            now(),
        );
        let account = step(account, withdraw(dec!(10)), now());

        let account = step(account, AccountCommand::RemoveWithdrawPolicy, now());
        assert_eq!(account.policy, None);

        // Unconstrained now; only the balance floor applies.
        let account = step(account, withdraw(dec!(10)), now());
        let account = step(account, withdraw(dec!(10)), now());
        assert_eq!(account.current_funds, Decimal::ZERO);
    }

    #[test]
    fn replacing_the_policy_resets_period_accounting() {
        let account = step(Account::default(), deposit(dec!(30)), now());
        let account = step(
            account,
            AccountCommand::SetWithdrawPolicy {
                max_amount: dec!(10),
                period: Period::Minute,
            },
            now(),
        );
        let account = step(account, withdraw(dec!(10)), now());
        assert_eq!(
            account.policy.as_ref().unwrap().funds_withdrawn_in_period,
            dec!(10)
        );

        // Re-setting the policy at the same instant starts from zero.
        let account = step(
            account,
            AccountCommand::SetWithdrawPolicy {
                max_amount: dec!(10),
                period: Period::Minute,
            },
            now(),
        );
        assert_eq!(
            account.policy.as_ref().unwrap().funds_withdrawn_in_period,
            Decimal::ZERO
        );

        let account = step(account, withdraw(dec!(10)), now());
        assert_eq!(account.current_funds, dec!(10));
    }

    #[test]
    fn zero_max_policy_forbids_all_withdrawals() {
        let cmd = AccountCommand::SetWithdrawPolicy {
            max_amount: Decimal::ZERO,
            period: Period::Daily,
        };
        assert_eq!(cmd.validate(), Ok(()));

        let account = step(Account::default(), deposit(dec!(30)), now());
        let account = step(account, cmd, now());

        let err = account.decide(withdraw(dec!(1)), now()).unwrap_err();
        assert_eq!(err, AccountError::ExceedsPeriodLimit);
    }

    #[test]
    fn insufficient_funds_wins_over_period_limit() {
        // Balance check runs before the policy check.
        let account = step(Account::default(), deposit(dec!(5)), now());
        let account = step(
            account,
            AccountCommand::SetWithdrawPolicy {
                max_amount: Decimal::ZERO,
                period: Period::Daily,
            },
            now(),
        );
        let err = account.decide(withdraw(dec!(10)), now()).unwrap_err();
        assert_eq!(err, AccountError::InsufficientFunds);
    }

    #[test]
    fn validate_rejects_non_positive_amounts() {
        assert_eq!(
            deposit(Decimal::ZERO).validate(),
            Err(ValidationError::NonPositiveAmount)
        );
        assert_eq!(
            withdraw(dec!(-1)).validate(),
            Err(ValidationError::NonPositiveAmount)
        );
        assert_eq!(deposit(dec!(0.01)).validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_negative_max_amount() {
        let cmd = AccountCommand::SetWithdrawPolicy {
            max_amount: dec!(-1),
            period: Period::Weekly,
        };
        assert_eq!(cmd.validate(), Err(ValidationError::NegativeMaxAmount));
    }

    #[test]
    fn events_roundtrip_through_their_wire_tags() {
        let event = AccountEvent::FundsWithdrawn {
            amount: dec!(10),
            description: "lunch".into(),
            time: now(),
            period_changed: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "funds-withdrawn");
        assert_eq!(json["data"]["period_changed"], true);

        let back: AccountEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn replay_reproduces_decide_time_state_across_a_rollover() {
        // Build a history spanning a period change, then replay it from
        // scratch and compare against the incrementally evolved state.
        let mut account = Account::default();
        let mut history: Vec<AccountEvent> = Vec::new();
        let mut at = now();

        let script = [
            (deposit(dec!(30)), Duration::zero()),
            (
                AccountCommand::SetWithdrawPolicy {
                    max_amount: dec!(10),
                    period: Period::Minute,
                },
                Duration::zero(),
            ),
            (withdraw(dec!(10)), Duration::zero()),
            (withdraw(dec!(10)), Duration::hours(24)),
            (AccountCommand::RemoveWithdrawPolicy, Duration::zero()),
            (withdraw(dec!(10)), Duration::zero()),
        ];

        for (cmd, advance) in script {
            at += advance;
            let events = account.decide(cmd, at).unwrap();
            for event in &events {
                account = account.evolve(event);
            }
            history.extend(events);
        }

        let replayed: Account = crate::aggregate::replay(&history);
        assert_eq!(replayed, account);
        assert_eq!(replayed.current_funds, Decimal::ZERO);
    }
}
