//! Bitcoin Chain Client
//!
//! Polls an Esplora-style API for block data and transaction confirmations.
//! The scanner consumes this through the `BtcChainReader` trait so tests can
//! substitute a mock chain.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Default request timeout for chain queries
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bitcoin chain access errors
#[derive(Debug, Error)]
pub enum BtcClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("block not found at height {0}")]
    BlockNotFound(u64),

    #[error("transaction not found: {0}")]
    TxNotFound(String),

    #[error("parse error: {0}")]
    ParseError(String),
}

/// Confirmation status of a transaction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub block_time: Option<u64>,
}

/// Transaction input (prevout carries the funding address)
#[derive(Debug, Clone, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    pub prevout: Option<TxOutput>,
}

/// Transaction output
#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    pub scriptpubkey: String,
    pub scriptpubkey_type: String,
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// A transaction as returned by the chain API
#[derive(Debug, Clone, Deserialize)]
pub struct BtcTx {
    pub txid: String,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
    pub status: TxStatus,
}

impl BtcTx {
    /// Address of the first input's prevout, i.e. the deposit sender
    pub fn sender_address(&self) -> Option<&str> {
        self.vin
            .first()
            .and_then(|input| input.prevout.as_ref())
            .and_then(|prevout| prevout.scriptpubkey_address.as_deref())
    }

    /// Total value paid to the given address across outputs
    pub fn value_to(&self, address: &str) -> u64 {
        self.vout
            .iter()
            .filter(|out| out.scriptpubkey_address.as_deref() == Some(address))
            .map(|out| out.value)
            .sum()
    }

    /// UTF-8 payload of the first OP_RETURN output, if any
    pub fn op_return_payload(&self) -> Option<String> {
        self.vout
            .iter()
            .find(|out| out.scriptpubkey_type == "op_return")
            .and_then(|out| decode_op_return(&out.scriptpubkey))
    }
}

/// Decode the pushed data of an OP_RETURN script into UTF-8
fn decode_op_return(script_hex: &str) -> Option<String> {
    let bytes = hex::decode(script_hex).ok()?;
    if bytes.first() != Some(&0x6a) {
        return None;
    }

    let data = match *bytes.get(1)? {
        // OP_PUSHDATA1: one-byte length follows
        0x4c => {
            let len = *bytes.get(2)? as usize;
            bytes.get(3..3 + len)?
        }
        // direct push, length is the opcode itself
        len if len <= 75 => bytes.get(2..2 + len as usize)?,
        _ => return None,
    };

    String::from_utf8(data.to_vec()).ok()
}

/// Read access to the Bitcoin chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BtcChainReader: Send + Sync {
    /// Current chain tip height
    async fn get_tip_height(&self) -> Result<u64, BtcClientError>;

    /// Block hash at a given height
    async fn get_block_hash(&self, height: u64) -> Result<String, BtcClientError>;

    /// All transactions in a block
    async fn get_block_txs(&self, block_hash: &str) -> Result<Vec<BtcTx>, BtcClientError>;

    /// Confirmation status for a transaction
    async fn get_tx_status(&self, txid: &str) -> Result<TxStatus, BtcClientError>;
}

/// Esplora-backed implementation of `BtcChainReader`
#[derive(Debug, Clone)]
pub struct EsploraBtcClient {
    client: Client,
    base_url: String,
}

impl EsploraBtcClient {
    /// Create a client for the given Esplora base URL
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BtcChainReader for EsploraBtcClient {
    async fn get_tip_height(&self) -> Result<u64, BtcClientError> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let resp = self.client.get(&url).send().await?;

        resp.text()
            .await?
            .trim()
            .parse()
            .map_err(|e| BtcClientError::ParseError(format!("invalid height: {}", e)))
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, BtcClientError> {
        let url = format!("{}/block-height/{}", self.base_url, height);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(BtcClientError::BlockNotFound(height));
        }

        Ok(resp.text().await?.trim().to_string())
    }

    async fn get_block_txs(&self, block_hash: &str) -> Result<Vec<BtcTx>, BtcClientError> {
        // Esplora pages block transactions 25 at a time
        let mut txs = Vec::new();
        let mut start = 0usize;

        loop {
            let url = format!("{}/block/{}/txs/{}", self.base_url, block_hash, start);
            let resp = self.client.get(&url).send().await?;

            if !resp.status().is_success() {
                return Err(BtcClientError::ParseError(format!(
                    "block txs fetch failed for {}",
                    block_hash
                )));
            }

            let page: Vec<BtcTx> = resp.json().await?;
            let page_len = page.len();
            txs.extend(page);

            if page_len < 25 {
                break;
            }
            start += page_len;
        }

        Ok(txs)
    }

    async fn get_tx_status(&self, txid: &str) -> Result<TxStatus, BtcClientError> {
        let url = format!("{}/tx/{}/status", self.base_url, txid);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(BtcClientError::TxNotFound(txid.to_string()));
        }

        let status: TxStatus = resp.json().await?;
        Ok(status)
    }
}
