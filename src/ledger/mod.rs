//! Ledger-Chain Client
//!
//! Read/write façade over the bridge contract on the ledger chain. The
//! relayer drives deposit state through this interface; the contract itself
//! (status validation, compare-and-swap on rollback, fee accounting) is an
//! external collaborator and is only called, never reimplemented here.

pub mod rpc;

pub use rpc::HttpLedgerClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Deposit, DepositStatus, RawGlobalParams, YieldProviderSummary};

/// Ledger access errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC failed: {0}")]
    Rpc(String),

    #[error("contract rejected call: {0}")]
    Contract(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Rpc(e.to_string())
    }
}

/// Bridge contract façade
///
/// All mutations are idempotent or guarded at the contract: `insert_deposit`
/// is a no-op for an existing `btc_txn_hash`, and `rollback_deposit_status`
/// is conditioned on the deposit still being in a retry-eligible state, so
/// concurrent callers cannot produce lost updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Look up a deposit by its Bitcoin transaction hash
    async fn get_deposit_by_txn_hash(&self, hash: &str) -> Result<Option<Deposit>, LedgerError>;

    /// List all deposits currently in the given status
    async fn get_deposits_by_status(
        &self,
        status: DepositStatus,
    ) -> Result<Vec<Deposit>, LedgerError>;

    /// Record a newly observed deposit (no-op if the hash already exists)
    async fn insert_deposit(&self, deposit: &Deposit) -> Result<(), LedgerError>;

    /// Advance a deposit's status (forward progress only)
    async fn update_deposit_status(
        &self,
        hash: &str,
        status: DepositStatus,
    ) -> Result<(), LedgerError>;

    /// Roll an error-halted deposit back to its pre-error status,
    /// clearing remarks and incrementing the retry counter
    async fn rollback_deposit_status(&self, hash: &str) -> Result<(), LedgerError>;

    /// Read the current protocol-wide parameters
    async fn get_global_params(&self) -> Result<RawGlobalParams, LedgerError>;

    /// Read the yield provider contract summary
    async fn get_yield_provider_summary(&self) -> Result<YieldProviderSummary, LedgerError>;
}
