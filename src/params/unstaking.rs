//! Unstaking Period Resolver
//!
//! On-demand lookup of the current withdrawal waiting time from the yield
//! provider contract, with an environment-dependent static fallback.

use std::sync::Arc;
use tracing::warn;

use crate::config::RunEnvironment;
use crate::ledger::LedgerClient;

/// Fallback waiting time outside production: 5 minutes
pub const FALLBACK_NON_PRODUCTION_MS: u64 = 5 * 60 * 1_000;

/// Fallback waiting time in production: 2 days
pub const FALLBACK_PRODUCTION_MS: u64 = 2 * 24 * 60 * 60 * 1_000;

/// Resolves the current unstaking period in milliseconds
///
/// The fallback applies to new computations only; a period a user already
/// started waiting under is never shortened by it.
pub struct UnstakingPeriodResolver {
    ledger: Arc<dyn LedgerClient>,
    environment: RunEnvironment,
}

impl UnstakingPeriodResolver {
    /// Create a resolver for the given environment
    pub fn new(ledger: Arc<dyn LedgerClient>, environment: RunEnvironment) -> Self {
        Self {
            ledger,
            environment,
        }
    }

    /// Current withdrawal waiting time in milliseconds
    pub async fn get_unstaking_period(&self) -> u64 {
        match self.ledger.get_yield_provider_summary().await {
            Ok(summary) => summary.withdrawal_waiting_time_ms,
            Err(e) => {
                let fallback = self.fallback_ms();
                warn!(error = %e, fallback_ms = fallback, "yield provider summary unavailable, using fallback");
                fallback
            }
        }
    }

    fn fallback_ms(&self) -> u64 {
        if self.environment.is_production() {
            FALLBACK_PRODUCTION_MS
        } else {
            FALLBACK_NON_PRODUCTION_MS
        }
    }
}
