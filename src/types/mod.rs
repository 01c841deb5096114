//! Shared data model for the relayer

pub mod deposit;
pub mod params;

pub use deposit::{Deposit, DepositStatus};
pub use params::{GlobalParams, RawGlobalParams, YieldProviderSummary};
