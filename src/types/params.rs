//! Global Protocol Parameters
//!
//! Local snapshot of the protocol economics mirrored from the ledger
//! contract: staking caps, fee ratios, treasury address, retry cap.

use serde::{Deserialize, Serialize};

/// Divisor converting basis points into fee ratios
pub const BASIS_POINT_DIVISOR: f64 = 10_000.0;

/// Raw parameter payload as returned by the ledger contract
///
/// Fee fields are integer basis points; `max_retry_count` may be 0 or
/// missing on chain, which the snapshot conversion corrects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGlobalParams {
    pub mpc_contract: String,
    pub btc_staking_cap: u64,
    pub btc_max_staking_amount: u64,
    pub btc_min_staking_amount: u64,
    pub fee_deposit_bps: u64,
    pub fee_redemption_bps: u64,
    pub fee_yield_provider_rewards_bps: u64,
    pub fee_bridging_bps: u64,
    pub treasury_address: String,
    #[serde(default)]
    pub max_retry_count: u32,
}

/// Process-wide snapshot of protocol economics
///
/// Fee percentages are stored as ratios (basis points / 10 000) so
/// consumers multiply directly against satoshi amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalParams {
    pub mpc_contract: String,
    pub btc_staking_cap: u64,
    pub btc_max_staking_amount: u64,
    pub btc_min_staking_amount: u64,
    pub fee_deposit: f64,
    pub fee_redemption: f64,
    pub fee_yield_provider_rewards: f64,
    pub fee_bridging: f64,
    pub treasury_address: String,
    /// Always at least 1 so a stuck deposit can be retried
    pub max_retry_count: u32,
}

impl From<RawGlobalParams> for GlobalParams {
    fn from(raw: RawGlobalParams) -> Self {
        Self {
            mpc_contract: raw.mpc_contract,
            btc_staking_cap: raw.btc_staking_cap,
            btc_max_staking_amount: raw.btc_max_staking_amount,
            btc_min_staking_amount: raw.btc_min_staking_amount,
            fee_deposit: raw.fee_deposit_bps as f64 / BASIS_POINT_DIVISOR,
            fee_redemption: raw.fee_redemption_bps as f64 / BASIS_POINT_DIVISOR,
            fee_yield_provider_rewards: raw.fee_yield_provider_rewards_bps as f64
                / BASIS_POINT_DIVISOR,
            fee_bridging: raw.fee_bridging_bps as f64 / BASIS_POINT_DIVISOR,
            treasury_address: raw.treasury_address,
            max_retry_count: raw.max_retry_count.max(1),
        }
    }
}

impl Default for GlobalParams {
    fn default() -> Self {
        GlobalParams::from(RawGlobalParams::default())
    }
}

/// Summary payload from the yield provider contract
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YieldProviderSummary {
    pub withdrawal_waiting_time_ms: u64,
    #[serde(default)]
    pub total_deposit_sat: u64,
    #[serde(default)]
    pub n_confirmation: u64,
}
