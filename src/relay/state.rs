//! Deposit State Machine
//!
//! The authoritative set of legal status transitions for a deposit. All
//! functions are pure; callers (scanner, retry service) decide when to apply
//! a transition and the ledger contract enforces it transactionally.
//!
//! Forward progress is monotonic:
//! mempool → deposited_into_atlas → pending_yield_provider → yield_provider_deposited.
//! The single backward edge is the rollback used by the retry path, legal
//! only while an error is recorded in `remarks`.

use serde::Serialize;

use crate::types::{Deposit, DepositStatus};

/// Next status in the forward chain, `None` from the terminal state
pub fn next_forward(status: DepositStatus) -> Option<DepositStatus> {
    match status {
        DepositStatus::PendingMempool => Some(DepositStatus::DepositedIntoAtlas),
        DepositStatus::DepositedIntoAtlas => Some(DepositStatus::PendingYieldProviderDeposit),
        DepositStatus::PendingYieldProviderDeposit => Some(DepositStatus::YieldProviderDeposited),
        DepositStatus::YieldProviderDeposited => None,
    }
}

/// Status a rollback lands on, `None` when the status has no backward edge
///
/// The rollback returns the deposit to the state preceding the failed
/// forward step so the scanner can re-attempt it; clearing `remarks` is part
/// of the transition and happens at the ledger layer.
pub fn rollback_target(status: DepositStatus) -> Option<DepositStatus> {
    match status {
        DepositStatus::DepositedIntoAtlas => Some(DepositStatus::DepositedIntoAtlas),
        DepositStatus::PendingYieldProviderDeposit => Some(DepositStatus::DepositedIntoAtlas),
        DepositStatus::PendingMempool | DepositStatus::YieldProviderDeposited => None,
    }
}

/// Whether this status permits a rollback at all
pub fn is_retry_status(status: DepositStatus) -> bool {
    rollback_target(status).is_some()
}

/// The two sub-conditions of the retry predicate, reported separately so a
/// rejected caller can tell "no error recorded" from "wrong status"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryEligibility {
    pub has_error: bool,
    pub is_in_retry_status: bool,
}

impl RetryEligibility {
    /// Both sub-conditions must hold; either alone is insufficient
    pub fn eligible(&self) -> bool {
        self.has_error && self.is_in_retry_status
    }
}

/// Evaluate the retry-eligibility predicate for a deposit
pub fn retry_eligibility(deposit: &Deposit) -> RetryEligibility {
    RetryEligibility {
        has_error: deposit.has_error(),
        is_in_retry_status: is_retry_status(deposit.status),
    }
}
