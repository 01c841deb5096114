//! Atlas Deposit Relayer
//!
//! Server-side subsystem bridging Bitcoin deposits into the Atlas ledger
//! contract:
//!
//! 1. **BitcoinScanner** - Polls the Bitcoin chain from durable cursors,
//!    records qualifying deposits, and advances them once confirmed
//! 2. **DepositRetryService** - Signed, replay-safe rollback path for
//!    deposits halted by an error
//! 3. **GlobalParamsCache** - Local snapshot of protocol economics,
//!    refreshed from the ledger contract on a timer
//!
//! The ledger contract itself (status validation, compare-and-swap on
//! rollback, minting) is an external collaborator reached through
//! `LedgerClient`.

pub mod api;
pub mod common;
pub mod config;
pub mod ledger;
pub mod logging;
pub mod params;
pub mod relay;
pub mod storage;
pub mod types;

// Re-exports: configuration
pub use config::{BtcNetwork, ConfigError, RelayerConfig, RunEnvironment};

// Re-exports: errors
pub use common::{RelayerError, Result};

// Re-exports: ledger client
pub use ledger::{HttpLedgerClient, LedgerClient, LedgerError};

// Re-exports: params
pub use params::{GlobalParamsCache, UnstakingPeriodResolver};

// Re-exports: relay core
pub use relay::{
    BitcoinScanner, DepositRetryService, EsploraBtcClient, MessageSignatureVerifier, RetryError,
    RetryRequest, ScannerConfig,
};

// Re-exports: storage
pub use storage::{CursorStore, MemoryCursorStore, SqliteCursorStore};

// Re-exports: data model
pub use types::{Deposit, DepositStatus, GlobalParams};

/// Satoshi conversion helpers
pub mod units {
    pub const SATS_PER_BTC: u64 = 100_000_000;

    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / SATS_PER_BTC as f64
    }

    pub fn format_sats(sats: u64) -> String {
        format!("{} sats ({:.8} BTC)", sats, sats_to_btc(sats))
    }
}
