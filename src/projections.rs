//! Read models over the account event stream.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::AccountEvent;
use crate::period::{period_window, Period};
use crate::projection::Projection;

// ---------------------------------------------------------------------------
// CurrentFunds
// ---------------------------------------------------------------------------

/// Running balance of an account.
///
/// Tracks only the net of deposits and withdrawals; policy events do not
/// touch the balance and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentFunds {
    pub amount: Decimal,
}

impl Projection for CurrentFunds {
    const NAME: &'static str = "balance";
    type Event = AccountEvent;

    fn apply(&mut self, event: &AccountEvent) {
        match event {
            AccountEvent::FundsDeposited { amount, .. } => self.amount += *amount,
            AccountEvent::FundsWithdrawn { amount, .. } => self.amount -= *amount,
            AccountEvent::WithdrawPolicySet { .. } | AccountEvent::WithdrawPolicyRemoved { .. } => {
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PeriodSummary
// ---------------------------------------------------------------------------

/// Activity summary for the current budget period.
///
/// Mirrors the write model's period accounting but also counts individual
/// withdrawals, which the aggregate itself does not track. All fields reset
/// to their defaults when the policy is removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Granularity of the active policy, if any.
    pub policy_period: Option<Period>,
    /// Instant the active policy was set.
    pub policy_start_time: Option<DateTime<FixedOffset>>,
    /// Cap of the active policy. Zero when no policy is active.
    pub policy_max_withdraw_amount: Decimal,
    /// Number of withdrawals recorded in the current period.
    pub withdrawals_in_period: u64,
    /// Total withdrawn in the current period.
    pub funds_withdrawn_in_period: Decimal,
    /// Start of the current period window.
    pub period_start_time: Option<DateTime<FixedOffset>>,
    /// Start of the next period window.
    pub next_period_start_time: Option<DateTime<FixedOffset>>,
}

impl Projection for PeriodSummary {
    const NAME: &'static str = "period-summary";
    type Event = AccountEvent;

    fn apply(&mut self, event: &AccountEvent) {
        match event {
            AccountEvent::FundsDeposited { .. } => {}

            AccountEvent::FundsWithdrawn {
                amount,
                time,
                period_changed,
                ..
            } => {
                if *period_changed {
                    self.withdrawals_in_period = 0;
                    self.funds_withdrawn_in_period = Decimal::ZERO;
                    match self.policy_period {
                        Some(period) => {
                            let (start, next) = period_window(time, period);
                            self.period_start_time = Some(start);
                            self.next_period_start_time = Some(next);
                        }
                        None => {
                            self.period_start_time = None;
                            self.next_period_start_time = None;
                        }
                    }
                }
                self.withdrawals_in_period += 1;
                self.funds_withdrawn_in_period += *amount;
            }

            AccountEvent::WithdrawPolicySet {
                max_withdraw_amount,
                period,
                policy_start_time,
                ..
            } => {
                self.policy_period = Some(*period);
                self.policy_start_time = Some(*policy_start_time);
                self.policy_max_withdraw_amount = *max_withdraw_amount;
                self.withdrawals_in_period = 0;
                self.funds_withdrawn_in_period = Decimal::ZERO;
                // The window is derived from the policy's start instant,
                // not copied from the event, the same way a rollover
                // re-derives it from the withdrawal's instant.
                let (start, next) = period_window(policy_start_time, *period);
                self.period_start_time = Some(start);
                self.next_period_start_time = Some(next);
            }

            AccountEvent::WithdrawPolicyRemoved { .. } => {
                *self = Self::default();
            }
        }
    }
}
