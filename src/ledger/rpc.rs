//! HTTP Ledger Gateway Client
//!
//! Talks to the operator's contract gateway, which exposes the bridge
//! contract's view and change methods over plain HTTP. Every call carries a
//! bounded timeout; a slow gateway fails the current iteration rather than
//! wedging a loop.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::{LedgerClient, LedgerError};
use crate::types::{Deposit, DepositStatus, RawGlobalParams, YieldProviderSummary};

/// Default request timeout for gateway calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the ledger gateway
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: String,
}

impl HttpLedgerClient {
    /// Create a client for the given gateway base URL
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

    async fn read_error_body(resp: reqwest::Response) -> String {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        format!("status {}: {}", status, body)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_deposit_by_txn_hash(&self, hash: &str) -> Result<Option<Deposit>, LedgerError> {
        let url = format!("{}/deposit/{}", self.base_url, hash);
        let resp = self.client.get(&url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(LedgerError::Rpc(Self::read_error_body(resp).await));
        }

        let deposit: Deposit = resp
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(Some(deposit))
    }

    async fn get_deposits_by_status(
        &self,
        status: DepositStatus,
    ) -> Result<Vec<Deposit>, LedgerError> {
        let url = format!("{}/deposits?status={}", self.base_url, status);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(LedgerError::Rpc(Self::read_error_body(resp).await));
        }

        resp.json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn insert_deposit(&self, deposit: &Deposit) -> Result<(), LedgerError> {
        let url = format!("{}/deposit", self.base_url);
        let resp = self.client.post(&url).json(deposit).send().await?;

        // 409 means the hash is already recorded, which is fine: the scanner
        // may legitimately revisit an already-processed block range.
        if resp.status() == StatusCode::CONFLICT || resp.status().is_success() {
            return Ok(());
        }

        Err(LedgerError::Contract(Self::read_error_body(resp).await))
    }

    async fn update_deposit_status(
        &self,
        hash: &str,
        status: DepositStatus,
    ) -> Result<(), LedgerError> {
        let url = format!("{}/deposit/{}/status", self.base_url, hash);
        let body = serde_json::json!({ "status": status });
        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(LedgerError::Contract(Self::read_error_body(resp).await));
        }
        Ok(())
    }

    async fn rollback_deposit_status(&self, hash: &str) -> Result<(), LedgerError> {
        let url = format!("{}/deposit/{}/rollback", self.base_url, hash);
        let resp = self.client.post(&url).send().await?;

        if !resp.status().is_success() {
            return Err(LedgerError::Contract(Self::read_error_body(resp).await));
        }
        Ok(())
    }

    async fn get_global_params(&self) -> Result<RawGlobalParams, LedgerError> {
        let url = format!("{}/params", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(LedgerError::Rpc(Self::read_error_body(resp).await));
        }

        resp.json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn get_yield_provider_summary(&self) -> Result<YieldProviderSummary, LedgerError> {
        let url = format!("{}/yield-provider/summary", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(LedgerError::Rpc(Self::read_error_body(resp).await));
        }

        resp.json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let client = HttpLedgerClient::new("https://gateway.atlas.example/");
        assert_eq!(client.base_url(), "https://gateway.atlas.example");
    }
}
