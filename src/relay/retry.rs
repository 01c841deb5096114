//! Deposit Retry Service
//!
//! Externally-facing operation that validates a retry request end-to-end and
//! applies the rollback transition: signature, deposit lookup, sender match,
//! eligibility predicate, retry cap, then the ledger rollback. Exactly one
//! deposit's status/remarks is mutated by a successful call.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::signature::SignatureVerifier;
use super::state::{retry_eligibility, RetryEligibility};
use crate::ledger::{LedgerClient, LedgerError};
use crate::params::GlobalParamsCache;
use crate::types::Deposit;

/// A signed retry request for a stuck deposit
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RetryRequest {
    /// Bitcoin transaction hash of the deposit to retry
    pub btc_txn_hash: String,
    /// Claimed sender address
    pub address: String,
    /// Compressed public key of the signer (hex)
    pub public_key: String,
    /// ECDSA signature over the canonical retry message (base64)
    pub signature: String,
}

/// Retry request failures
#[derive(Debug, Error)]
pub enum RetryError {
    /// Opaque by design: does not reveal whether the deposit exists
    #[error("invalid signature")]
    InvalidSignature,

    #[error("deposit not found: {0}")]
    DepositNotFound(String),

    #[error("sender mismatch: expected {expected}, got {actual}")]
    SenderMismatch { expected: String, actual: String },

    #[error("deposit is not retryable")]
    NotRetryable {
        deposit: Box<Deposit>,
        eligibility: RetryEligibility,
    },

    #[error("retry limit exceeded: {count} of {max} attempts used")]
    RetryLimitExceeded { count: u32, max: u32 },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Validates and applies deposit retries
pub struct DepositRetryService {
    ledger: Arc<dyn LedgerClient>,
    verifier: Arc<dyn SignatureVerifier>,
    params: Arc<GlobalParamsCache>,
}

impl DepositRetryService {
    /// Create a retry service
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        verifier: Arc<dyn SignatureVerifier>,
        params: Arc<GlobalParamsCache>,
    ) -> Self {
        Self {
            ledger,
            verifier,
            params,
        }
    }

    /// Validate a retry request and roll the deposit back to its pre-error
    /// status; returns the refreshed deposit on success
    pub async fn retry(&self, request: &RetryRequest) -> Result<Deposit, RetryError> {
        // Signature first, before touching the ledger, so an unauthorized
        // caller learns nothing about the deposit's existence.
        self.verifier
            .verify(
                &request.btc_txn_hash,
                &request.address,
                &request.public_key,
                &request.signature,
            )
            .await
            .map_err(|_| RetryError::InvalidSignature)?;

        let deposit = self
            .ledger
            .get_deposit_by_txn_hash(&request.btc_txn_hash)
            .await?
            .ok_or_else(|| RetryError::DepositNotFound(request.btc_txn_hash.clone()))?;

        if request.address != deposit.btc_sender_address {
            return Err(RetryError::SenderMismatch {
                expected: deposit.btc_sender_address.clone(),
                actual: request.address.clone(),
            });
        }

        let eligibility = retry_eligibility(&deposit);
        if !eligibility.eligible() {
            return Err(RetryError::NotRetryable {
                deposit: Box::new(deposit),
                eligibility,
            });
        }

        let max = self.params.current().max_retry_count;
        if deposit.retry_count >= max {
            return Err(RetryError::RetryLimitExceeded {
                count: deposit.retry_count,
                max,
            });
        }

        // The contract conditions the rollback on the deposit still being
        // retry-eligible; a concurrent caller losing that race gets the
        // refreshed snapshot back as NotRetryable.
        if let Err(e) = self.ledger.rollback_deposit_status(&request.btc_txn_hash).await {
            if matches!(e, LedgerError::Contract(_)) {
                if let Some(current) = self
                    .ledger
                    .get_deposit_by_txn_hash(&request.btc_txn_hash)
                    .await?
                {
                    let eligibility = retry_eligibility(&current);
                    if !eligibility.eligible() {
                        return Err(RetryError::NotRetryable {
                            deposit: Box::new(current),
                            eligibility,
                        });
                    }
                }
            }
            return Err(e.into());
        }

        info!(
            txn_hash = %request.btc_txn_hash,
            sender = %request.address,
            "deposit rolled back for retry"
        );

        self.ledger
            .get_deposit_by_txn_hash(&request.btc_txn_hash)
            .await?
            .ok_or_else(|| RetryError::DepositNotFound(request.btc_txn_hash.clone()))
    }
}
