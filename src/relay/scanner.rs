//! Bitcoin Deposit Scanner
//!
//! Advances the Bitcoin-chain read cursor height by height, discovers
//! deposit-relevant transactions and records them on the ledger, and runs a
//! separate confirmation sweep that advances pending deposits once they
//! reach the required depth.
//!
//! Cursor discipline: a block's cursor is persisted only after every
//! transaction in that block is reflected in ledger state. A failure
//! mid-batch aborts the iteration before the cursor write, so the next tick
//! redoes the batch; the ledger apply is idempotent keyed by txn hash.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::btc::{BtcChainReader, BtcTx};
use super::state;
use crate::common::RelayerError;
use crate::ledger::LedgerClient;
use crate::params::GlobalParamsCache;
use crate::storage::CursorStore;
use crate::types::{Deposit, DepositStatus};

/// Scanner configuration, derived from `RelayerConfig`
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Bitcoin vault address deposits are paid to
    pub vault_address: String,
    /// Confirmation depth before a deposit leaves the mempool stage
    pub required_confirmations: u32,
    /// Cursor key for the height stream
    pub height_cursor_key: String,
    /// Cursor key for the confirmed-time stream
    pub confirmed_time_cursor_key: String,
    /// Default for the confirmed-time cursor when nothing is persisted
    pub confirmed_time_default: i64,
    /// Poll interval in seconds
    pub poll_interval_secs: u64,
}

/// Polls the Bitcoin chain and drives deposits into the state machine
pub struct BitcoinScanner {
    btc: Arc<dyn BtcChainReader>,
    ledger: Arc<dyn LedgerClient>,
    cursors: Arc<dyn CursorStore>,
    params: Arc<GlobalParamsCache>,
    config: ScannerConfig,
}

impl BitcoinScanner {
    /// Create a scanner
    pub fn new(
        btc: Arc<dyn BtcChainReader>,
        ledger: Arc<dyn LedgerClient>,
        cursors: Arc<dyn CursorStore>,
        params: Arc<GlobalParamsCache>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            btc,
            ledger,
            cursors,
            params,
            config,
        }
    }

    /// Run the scan loop (blocking)
    ///
    /// Dependency errors fail only the current iteration; the loop retries
    /// on its next tick rather than inline.
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            required_confirmations = self.config.required_confirmations,
            vault = %self.config.vault_address,
            "bitcoin scanner starting"
        );

        let mut tick = interval(Duration::from_secs(self.config.poll_interval_secs));

        loop {
            tick.tick().await;

            if let Err(e) = self.scan_once().await {
                warn!(error = %e, "scan iteration failed, retrying next tick");
            }
            if let Err(e) = self.sweep_confirmed_once().await {
                warn!(error = %e, "confirmation sweep failed, retrying next tick");
            }
        }
    }

    /// Scan new blocks from the persisted cursor up to the chain tip
    ///
    /// Returns the number of newly recorded deposits.
    pub async fn scan_once(&self) -> Result<u64, RelayerError> {
        let key = &self.config.height_cursor_key;
        let tip = self.btc.get_tip_height().await?;
        let last = self.cursors.get(key).await?.max(0) as u64;

        let start = last + 1;
        if start > tip {
            debug!(tip, "no new blocks");
            return Ok(0);
        }

        let mut new_deposits = 0u64;

        for height in start..=tip {
            new_deposits += self.process_block(height).await?;

            // Durable persistence before in-memory progress; a failed write
            // aborts the iteration so a crash cannot silently skip blocks.
            self.cursors.set(key, height as i64).await?;
        }

        Ok(new_deposits)
    }

    /// Record the qualifying transactions of one block on the ledger
    async fn process_block(&self, height: u64) -> Result<u64, RelayerError> {
        let hash = self.btc.get_block_hash(height).await?;
        let txs = self.btc.get_block_txs(&hash).await?;
        let params = self.params.current();

        let mut recorded = 0u64;

        for tx in &txs {
            let Some(candidate) = self.extract_deposit(tx) else {
                continue;
            };

            if params.btc_min_staking_amount > 0
                && candidate.amount_sat < params.btc_min_staking_amount
            {
                warn!(
                    txn_hash = %tx.txid,
                    amount_sat = candidate.amount_sat,
                    min = params.btc_min_staking_amount,
                    "deposit below minimum staking amount, skipping"
                );
                continue;
            }
            if params.btc_max_staking_amount > 0
                && candidate.amount_sat > params.btc_max_staking_amount
            {
                warn!(
                    txn_hash = %tx.txid,
                    amount_sat = candidate.amount_sat,
                    max = params.btc_max_staking_amount,
                    "deposit above maximum staking amount, skipping"
                );
                continue;
            }

            // Idempotent keyed by txn hash: revisiting a processed range
            // must not create duplicates or mutate existing records.
            if self
                .ledger
                .get_deposit_by_txn_hash(&tx.txid)
                .await?
                .is_some()
            {
                debug!(txn_hash = %tx.txid, "deposit already recorded");
                continue;
            }

            self.ledger.insert_deposit(&candidate).await?;
            info!(
                txn_hash = %tx.txid,
                sender = %candidate.btc_sender_address,
                amount = %crate::units::format_sats(candidate.amount_sat),
                height,
                "new deposit recorded"
            );
            recorded += 1;
        }

        Ok(recorded)
    }

    /// Extract a deposit candidate from a transaction, if it qualifies
    ///
    /// A qualifying transaction pays the vault address and carries a
    /// `receiving_chain_id:receiving_address` OP_RETURN payload.
    fn extract_deposit(&self, tx: &BtcTx) -> Option<Deposit> {
        let amount_sat = tx.value_to(&self.config.vault_address);
        if amount_sat == 0 {
            return None;
        }

        let payload = tx.op_return_payload()?;
        let (receiving_chain_id, receiving_address) = payload.split_once(':')?;
        if receiving_chain_id.is_empty() || receiving_address.is_empty() {
            return None;
        }

        let sender = tx.sender_address()?.to_string();

        Some(Deposit::new(
            tx.txid.clone(),
            sender,
            amount_sat,
            receiving_chain_id.to_string(),
            receiving_address.to_string(),
            tx.status.block_time.unwrap_or(0),
        ))
    }

    /// Re-check pending deposits against the required confirmation depth
    ///
    /// This is a distinct sweep from block-height scanning, tracked by its
    /// own cursor: the newest confirmed block time fully reflected in ledger
    /// state. Deposits are processed oldest-first so the persisted cursor
    /// always covers a contiguous prefix of applied work.
    pub async fn sweep_confirmed_once(&self) -> Result<u64, RelayerError> {
        let key = &self.config.confirmed_time_cursor_key;
        let tip = self.btc.get_tip_height().await?;

        let stored = self.cursors.get(key).await?;
        let last_time = if stored == 0 {
            self.config.confirmed_time_default
        } else {
            stored
        };

        let mut pending = self
            .ledger
            .get_deposits_by_status(DepositStatus::PendingMempool)
            .await?;
        pending.sort_by_key(|d| d.timestamp);

        let required = self.config.required_confirmations as u64;
        let mut advanced = 0u64;
        let mut newest_applied = last_time;

        for deposit in &pending {
            let status = match self.btc.get_tx_status(&deposit.btc_txn_hash).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(txn_hash = %deposit.btc_txn_hash, error = %e, "tx status unavailable, aborting sweep");
                    break;
                }
            };

            let Some(block_height) = status.block_height.filter(|_| status.confirmed) else {
                continue;
            };

            let depth = tip.saturating_sub(block_height) + 1;
            if depth < required {
                debug!(
                    txn_hash = %deposit.btc_txn_hash,
                    depth,
                    required,
                    "deposit below confirmation threshold"
                );
                continue;
            }

            let Some(next) = state::next_forward(deposit.status) else {
                continue;
            };

            if let Err(e) = self
                .ledger
                .update_deposit_status(&deposit.btc_txn_hash, next)
                .await
            {
                warn!(txn_hash = %deposit.btc_txn_hash, error = %e, "status advance failed, aborting sweep");
                break;
            }

            info!(
                txn_hash = %deposit.btc_txn_hash,
                depth,
                "deposit confirmed, advanced to {}",
                next
            );
            advanced += 1;

            let confirmed_ms = status.block_time.unwrap_or(0) as i64 * 1_000;
            if confirmed_ms > newest_applied {
                newest_applied = confirmed_ms;
            }
        }

        if newest_applied > stored {
            self.cursors.set(key, newest_applied).await?;
        }

        Ok(advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerError, MockLedgerClient};
    use crate::relay::btc::{MockBtcChainReader, TxInput, TxOutput, TxStatus};
    use crate::storage::MemoryCursorStore;
    use crate::types::RawGlobalParams;
    use mockall::predicate::eq;

    const VAULT: &str = "tb1qvault";

    fn config() -> ScannerConfig {
        ScannerConfig {
            vault_address: VAULT.to_string(),
            required_confirmations: 6,
            height_cursor_key: "btc:testnet:last_scanned_height".to_string(),
            confirmed_time_cursor_key: "btc:testnet:last_processed_confirmed_time".to_string(),
            confirmed_time_default: 0,
            poll_interval_secs: 30,
        }
    }

    fn default_params() -> Arc<GlobalParamsCache> {
        Arc::new(GlobalParamsCache::new(Arc::new(MockLedgerClient::new())))
    }

    fn output(addr: Option<&str>, value: u64, kind: &str, script: &str) -> TxOutput {
        TxOutput {
            scriptpubkey: script.to_string(),
            scriptpubkey_type: kind.to_string(),
            scriptpubkey_address: addr.map(str::to_string),
            value,
        }
    }

    fn deposit_tx(txid: &str, amount_sat: u64, block_time: u64) -> BtcTx {
        let payload = "near-mainnet:alice.near";
        let script = format!("6a{:02x}{}", payload.len(), hex::encode(payload));

        BtcTx {
            txid: txid.to_string(),
            vin: vec![TxInput {
                txid: "prev".to_string(),
                vout: 0,
                prevout: Some(output(Some("tb1qsender"), amount_sat * 2, "v0_p2wpkh", "0014aa")),
            }],
            vout: vec![
                output(Some(VAULT), amount_sat, "v0_p2wpkh", "0014bb"),
                output(None, 0, "op_return", &script),
            ],
            status: TxStatus {
                confirmed: true,
                block_height: Some(100),
                block_hash: Some("blockhash".to_string()),
                block_time: Some(block_time),
            },
        }
    }

    fn unrelated_tx(txid: &str) -> BtcTx {
        BtcTx {
            txid: txid.to_string(),
            vin: vec![],
            vout: vec![output(Some("tb1qother"), 1_000, "v0_p2wpkh", "0014cc")],
            status: TxStatus::default(),
        }
    }

    fn scanner(
        btc: MockBtcChainReader,
        ledger: MockLedgerClient,
        cursors: MemoryCursorStore,
        params: Arc<GlobalParamsCache>,
    ) -> BitcoinScanner {
        BitcoinScanner::new(
            Arc::new(btc),
            Arc::new(ledger),
            Arc::new(cursors),
            params,
            config(),
        )
    }

    #[tokio::test]
    async fn test_new_deposit_recorded_and_cursor_advanced() {
        let cursors = MemoryCursorStore::new();
        cursors.set("btc:testnet:last_scanned_height", 99).await.unwrap();

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(100));
        btc.expect_get_block_hash()
            .with(eq(100u64))
            .returning(|_| Ok("blockhash".to_string()));
        btc.expect_get_block_txs()
            .returning(|_| Ok(vec![deposit_tx("tx1", 250_000, 1_700_000_100), unrelated_tx("tx2")]));

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_deposit_by_txn_hash()
            .with(eq("tx1"))
            .returning(|_| Ok(None));
        ledger
            .expect_insert_deposit()
            .withf(|d: &Deposit| {
                d.btc_txn_hash == "tx1"
                    && d.amount_sat == 250_000
                    && d.btc_sender_address == "tb1qsender"
                    && d.receiving_chain_id == "near-mainnet"
                    && d.receiving_address == "alice.near"
                    && d.status == DepositStatus::PendingMempool
            })
            .times(1)
            .returning(|_| Ok(()));

        let scanner = scanner(btc, ledger, cursors.clone(), default_params());
        let recorded = scanner.scan_once().await.unwrap();

        assert_eq!(recorded, 1);
        assert_eq!(
            cursors.get("btc:testnet:last_scanned_height").await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let cursors = MemoryCursorStore::new();
        cursors.set("btc:testnet:last_scanned_height", 99).await.unwrap();

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(100));
        btc.expect_get_block_hash()
            .returning(|_| Ok("blockhash".to_string()));
        btc.expect_get_block_txs()
            .returning(|_| Ok(vec![deposit_tx("tx1", 250_000, 1_700_000_100)]));

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_deposit_by_txn_hash()
            .with(eq("tx1"))
            .returning(|_| {
                Ok(Some(Deposit::new(
                    "tx1".to_string(),
                    "tb1qsender".to_string(),
                    250_000,
                    "near-mainnet".to_string(),
                    "alice.near".to_string(),
                    1_700_000_100,
                )))
            });
        // No insert expectation: recording again would panic the mock

        let scanner = scanner(btc, ledger, cursors.clone(), default_params());
        let recorded = scanner.scan_once().await.unwrap();

        assert_eq!(recorded, 0);
        assert_eq!(
            cursors.get("btc:testnet:last_scanned_height").await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_failed_block_leaves_cursor_on_applied_prefix() {
        let cursors = MemoryCursorStore::new();
        cursors.set("btc:testnet:last_scanned_height", 99).await.unwrap();

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(101));
        btc.expect_get_block_hash()
            .returning(|h| Ok(format!("hash{}", h)));
        btc.expect_get_block_txs().returning(|hash| {
            if hash == "hash100" {
                Ok(vec![])
            } else {
                Ok(vec![deposit_tx("tx1", 250_000, 1_700_000_100)])
            }
        });

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_deposit_by_txn_hash()
            .returning(|_| Ok(None));
        ledger
            .expect_insert_deposit()
            .returning(|_| Err(LedgerError::Rpc("gateway down".to_string())));

        let scanner = scanner(btc, ledger, cursors.clone(), default_params());
        assert!(scanner.scan_once().await.is_err());

        // Block 100 applied and persisted; the failed block 101 did not
        // advance the cursor, so the next tick redoes it.
        assert_eq!(
            cursors.get("btc:testnet:last_scanned_height").await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_cursor_write_failure_aborts_iteration() {
        let cursors = MemoryCursorStore::new();
        cursors.set("btc:testnet:last_scanned_height", 99).await.unwrap();
        cursors.set_fail_writes(true).await;

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(100));
        btc.expect_get_block_hash()
            .returning(|_| Ok("blockhash".to_string()));
        btc.expect_get_block_txs().returning(|_| Ok(vec![]));

        let scanner = scanner(btc, MockLedgerClient::new(), cursors.clone(), default_params());
        assert!(scanner.scan_once().await.is_err());

        cursors.set_fail_writes(false).await;
        assert_eq!(
            cursors.get("btc:testnet:last_scanned_height").await.unwrap(),
            99
        );
    }

    #[tokio::test]
    async fn test_deposit_below_minimum_skipped() {
        let mut params_ledger = MockLedgerClient::new();
        params_ledger.expect_get_global_params().returning(|| {
            Ok(RawGlobalParams {
                btc_min_staking_amount: 500_000,
                ..RawGlobalParams::default()
            })
        });
        let params = Arc::new(GlobalParamsCache::new(Arc::new(params_ledger)));
        params.refresh().await.unwrap();

        let cursors = MemoryCursorStore::new();
        cursors.set("btc:testnet:last_scanned_height", 99).await.unwrap();

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(100));
        btc.expect_get_block_hash()
            .returning(|_| Ok("blockhash".to_string()));
        btc.expect_get_block_txs()
            .returning(|_| Ok(vec![deposit_tx("tx1", 250_000, 1_700_000_100)]));

        // No ledger expectations: the undersized deposit never reaches it
        let scanner = scanner(btc, MockLedgerClient::new(), cursors.clone(), params);
        assert_eq!(scanner.scan_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_advances_confirmed_deposit() {
        let cursors = MemoryCursorStore::new();

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(106));
        btc.expect_get_tx_status().with(eq("tx1")).returning(|_| {
            Ok(TxStatus {
                confirmed: true,
                block_height: Some(101),
                block_hash: Some("hash101".to_string()),
                block_time: Some(1_700_000_200),
            })
        });

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_deposits_by_status()
            .with(eq(DepositStatus::PendingMempool))
            .returning(|_| {
                Ok(vec![Deposit::new(
                    "tx1".to_string(),
                    "tb1qsender".to_string(),
                    250_000,
                    "near-mainnet".to_string(),
                    "alice.near".to_string(),
                    1_700_000_200,
                )])
            });
        ledger
            .expect_update_deposit_status()
            .with(eq("tx1"), eq(DepositStatus::DepositedIntoAtlas))
            .times(1)
            .returning(|_, _| Ok(()));

        let scanner = scanner(btc, ledger, cursors.clone(), default_params());
        let advanced = scanner.sweep_confirmed_once().await.unwrap();

        assert_eq!(advanced, 1);
        assert_eq!(
            cursors
                .get("btc:testnet:last_processed_confirmed_time")
                .await
                .unwrap(),
            1_700_000_200_000
        );
    }

    #[tokio::test]
    async fn test_sweep_respects_confirmation_threshold() {
        let cursors = MemoryCursorStore::new();

        let mut btc = MockBtcChainReader::new();
        // Depth = 106 - 102 + 1 = 5 < 6 required
        btc.expect_get_tip_height().returning(|| Ok(106));
        btc.expect_get_tx_status().returning(|_| {
            Ok(TxStatus {
                confirmed: true,
                block_height: Some(102),
                block_hash: Some("hash102".to_string()),
                block_time: Some(1_700_000_300),
            })
        });

        let mut ledger = MockLedgerClient::new();
        ledger.expect_get_deposits_by_status().returning(|_| {
            Ok(vec![Deposit::new(
                "tx1".to_string(),
                "tb1qsender".to_string(),
                250_000,
                "near-mainnet".to_string(),
                "alice.near".to_string(),
                1_700_000_300,
            )])
        });
        // No update expectation: below threshold must not advance

        let scanner = scanner(btc, ledger, cursors.clone(), default_params());
        assert_eq!(scanner.sweep_confirmed_once().await.unwrap(), 0);
        assert_eq!(
            cursors
                .get("btc:testnet:last_processed_confirmed_time")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_sweep_cursor_never_decreases() {
        let cursors = MemoryCursorStore::new();
        cursors
            .set("btc:testnet:last_processed_confirmed_time", 1_800_000_000_000)
            .await
            .unwrap();

        let mut btc = MockBtcChainReader::new();
        btc.expect_get_tip_height().returning(|| Ok(200));
        btc.expect_get_tx_status().returning(|_| {
            Ok(TxStatus {
                confirmed: true,
                block_height: Some(100),
                block_hash: Some("old".to_string()),
                block_time: Some(1_700_000_000),
            })
        });

        let mut ledger = MockLedgerClient::new();
        ledger.expect_get_deposits_by_status().returning(|_| {
            Ok(vec![Deposit::new(
                "tx1".to_string(),
                "tb1qsender".to_string(),
                250_000,
                "near-mainnet".to_string(),
                "alice.near".to_string(),
                1_700_000_000,
            )])
        });
        ledger
            .expect_update_deposit_status()
            .returning(|_, _| Ok(()));

        let scanner = scanner(btc, ledger, cursors.clone(), default_params());
        scanner.sweep_confirmed_once().await.unwrap();

        // An older confirmation never moves the cursor backwards
        assert_eq!(
            cursors
                .get("btc:testnet:last_processed_confirmed_time")
                .await
                .unwrap(),
            1_800_000_000_000
        );
    }
}
