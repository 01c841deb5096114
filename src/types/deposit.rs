//! Deposit Record Types
//!
//! Types for tracking Bitcoin deposits through their lifecycle:
//! pending_mempool → deposited_into_atlas → pending_yield_provider_deposit → yield_provider_deposited

use serde::{Deserialize, Serialize};

/// Status of a deposit through its lifecycle
///
/// Wire names are fixed by the ledger contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositStatus {
    /// BTC transaction seen in mempool / below the confirmation threshold
    #[serde(rename = "BTC_PENDING_DEPOSIT_MEMPOOL")]
    PendingMempool,
    /// Confirmed on Bitcoin and recorded in the Atlas contract
    #[serde(rename = "BTC_DEPOSITED_INTO_ATLAS")]
    DepositedIntoAtlas,
    /// Forwarding to the yield provider is in flight
    #[serde(rename = "BTC_PENDING_YIELD_PROVIDER_DEPOSIT")]
    PendingYieldProviderDeposit,
    /// Yield provider deposit confirmed (terminal)
    #[serde(rename = "BTC_YIELD_PROVIDER_DEPOSITED")]
    YieldProviderDeposited,
}

impl DepositStatus {
    /// Whether this status is a terminal success state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::YieldProviderDeposited)
    }
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingMempool => write!(f, "BTC_PENDING_DEPOSIT_MEMPOOL"),
            Self::DepositedIntoAtlas => write!(f, "BTC_DEPOSITED_INTO_ATLAS"),
            Self::PendingYieldProviderDeposit => write!(f, "BTC_PENDING_YIELD_PROVIDER_DEPOSIT"),
            Self::YieldProviderDeposited => write!(f, "BTC_YIELD_PROVIDER_DEPOSITED"),
        }
    }
}

impl std::str::FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BTC_PENDING_DEPOSIT_MEMPOOL" => Ok(Self::PendingMempool),
            "BTC_DEPOSITED_INTO_ATLAS" => Ok(Self::DepositedIntoAtlas),
            "BTC_PENDING_YIELD_PROVIDER_DEPOSIT" => Ok(Self::PendingYieldProviderDeposit),
            "BTC_YIELD_PROVIDER_DEPOSITED" => Ok(Self::YieldProviderDeposited),
            _ => Err(format!("unknown deposit status: {}", s)),
        }
    }
}

/// A deposit record tracking a single Bitcoin deposit transaction
///
/// The authoritative copy lives in the ledger contract; this struct is the
/// relayer-side view of it. Identity is `btc_txn_hash`, which never changes
/// and is the sole external correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    /// Bitcoin transaction hash (unique, immutable)
    pub btc_txn_hash: String,
    /// Address that funded the deposit
    pub btc_sender_address: String,
    /// Deposited amount in satoshis
    pub amount_sat: u64,
    /// Current lifecycle status
    pub status: DepositStatus,
    /// Error annotation; empty unless the deposit is error-halted
    #[serde(default)]
    pub remarks: String,
    /// Chain the wrapped representation is minted on
    pub receiving_chain_id: String,
    /// Receiving account on that chain
    pub receiving_address: String,

    // Fee breakdown, all in satoshis
    #[serde(default)]
    pub protocol_fee_sat: u64,
    #[serde(default)]
    pub minting_fee_sat: u64,
    #[serde(default)]
    pub bridging_fee_sat: u64,
    #[serde(default)]
    pub yield_provider_gas_fee_sat: u64,

    /// Number of rollbacks performed on this deposit
    #[serde(default)]
    pub retry_count: u32,
    /// Unix seconds when the deposit was first observed
    #[serde(default)]
    pub timestamp: u64,
}

impl Deposit {
    /// Create a record for a newly observed mempool transaction
    pub fn new(
        btc_txn_hash: String,
        btc_sender_address: String,
        amount_sat: u64,
        receiving_chain_id: String,
        receiving_address: String,
        timestamp: u64,
    ) -> Self {
        Self {
            btc_txn_hash,
            btc_sender_address,
            amount_sat,
            status: DepositStatus::PendingMempool,
            remarks: String::new(),
            receiving_chain_id,
            receiving_address,
            protocol_fee_sat: 0,
            minting_fee_sat: 0,
            bridging_fee_sat: 0,
            yield_provider_gas_fee_sat: 0,
            retry_count: 0,
            timestamp,
        }
    }

    /// Whether an error is recorded on this deposit
    pub fn has_error(&self) -> bool {
        !self.remarks.is_empty()
    }
}
