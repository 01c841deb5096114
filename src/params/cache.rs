//! Global Parameters Cache
//!
//! Process-wide snapshot of protocol economics, refreshed on a timer from
//! the ledger contract. Readers get the latest snapshot synchronously; the
//! refresh loop is the single writer and replaces the whole value at once,
//! so a reader never observes a half-updated snapshot.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::ledger::{LedgerClient, LedgerError};
use crate::types::GlobalParams;

/// Snapshot holder for protocol-wide parameters
///
/// Constructed at startup with a zero/default snapshot and handed to
/// consumers as `Arc<GlobalParamsCache>`. A failed refresh leaves the
/// previous snapshot intact.
pub struct GlobalParamsCache {
    ledger: Arc<dyn LedgerClient>,
    snapshot: RwLock<GlobalParams>,
}

impl GlobalParamsCache {
    /// Create a cache with a default snapshot
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            snapshot: RwLock::new(GlobalParams::default()),
        }
    }

    /// Latest snapshot; never touches the network
    pub fn current(&self) -> GlobalParams {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read parameters from the ledger contract
    ///
    /// The new snapshot is fully built before the lock is taken, so the
    /// replace is all-or-nothing.
    pub async fn refresh(&self) -> Result<(), LedgerError> {
        let raw = self.ledger.get_global_params().await?;
        let params = GlobalParams::from(raw);

        let mut snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *snapshot = params;

        debug!("global params refreshed");
        Ok(())
    }

    /// Spawn the background refresh loop
    ///
    /// Runs for the lifetime of the process; a failed refresh is logged and
    /// retried on the next tick.
    pub fn spawn_refresh_loop(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut tick = interval(every);

            loop {
                tick.tick().await;
                if let Err(e) = cache.refresh().await {
                    warn!(error = %e, "global params refresh failed, keeping previous snapshot");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedgerClient;
    use crate::types::RawGlobalParams;

    fn raw_params(deposit_bps: u64, max_retry: u32) -> RawGlobalParams {
        RawGlobalParams {
            mpc_contract: "mpc.atlas".to_string(),
            btc_staking_cap: 1_000_000_000,
            btc_max_staking_amount: 100_000_000,
            btc_min_staking_amount: 10_000,
            fee_deposit_bps: deposit_bps,
            fee_redemption_bps: 30,
            fee_yield_provider_rewards_bps: 1_000,
            fee_bridging_bps: 10,
            treasury_address: "treasury.atlas".to_string(),
            max_retry_count: max_retry,
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_global_params()
            .returning(|| Ok(raw_params(25, 3)));

        let cache = GlobalParamsCache::new(Arc::new(ledger));
        assert_eq!(cache.current().fee_deposit, 0.0);

        cache.refresh().await.unwrap();

        let params = cache.current();
        assert_eq!(params.fee_deposit, 0.0025);
        assert_eq!(params.max_retry_count, 3);
        assert_eq!(params.treasury_address, "treasury.atlas");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let mut ledger = MockLedgerClient::new();
        let mut seq = mockall::Sequence::new();
        ledger
            .expect_get_global_params()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(raw_params(25, 2)));
        ledger
            .expect_get_global_params()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(LedgerError::Rpc("gateway down".to_string())));

        let cache = GlobalParamsCache::new(Arc::new(ledger));

        cache.refresh().await.unwrap();
        let before = cache.current();

        assert!(cache.refresh().await.is_err());
        let after = cache.current();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_max_retry_count_never_zero() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_global_params()
            .returning(|| Ok(raw_params(25, 0)));

        let cache = GlobalParamsCache::new(Arc::new(ledger));
        cache.refresh().await.unwrap();

        assert_eq!(cache.current().max_retry_count, 1);
    }
}
