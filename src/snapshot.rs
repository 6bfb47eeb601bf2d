//! Balance snapshot: current real balances per strategy plus the
//! agent's idle cash.
//!
//! Queries are issued sequentially in registration order. The strict
//! variant seeds the reconciling deployable-total mode, where a single
//! missing figure invalidates the whole total; the lenient variant
//! feeds the reconciler, which degrades gracefully instead of aborting
//! the cycle.

use std::sync::Arc;

use tracing::warn;

use crate::strategy::{Strategy, StrategyQueryError};
use crate::vault::{VaultError, VaultLedger};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("strategy {strategy} balance query failed: {source}")]
    Strategy {
        strategy: String,
        #[source]
        source: StrategyQueryError,
    },
    #[error("agent cash query failed: {0}")]
    AgentCash(#[from] VaultError),
}

/// All balances read in one pass, in human token units.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Per-strategy balances, parallel to the registry.
    pub balances: Vec<f64>,
    /// The agent wallet's idle token balance.
    pub idle_cash: f64,
}

impl Snapshot {
    /// Total capital under agent control: strategy balances plus idle
    /// cash.
    pub fn total(&self) -> f64 {
        self.balances.iter().sum::<f64>() + self.idle_cash
    }
}

/// Snapshot where individual reads may have failed; failed entries are
/// carried instead of aborting the walk.
#[derive(Debug)]
pub struct LenientSnapshot {
    pub balances: Vec<Result<f64, StrategyQueryError>>,
    pub idle_cash: Result<f64, VaultError>,
}

/// Strict snapshot: any failing query aborts.
pub async fn take<V>(
    strategies: &[Arc<dyn Strategy>],
    vault: &V,
) -> Result<Snapshot, SnapshotError>
where
    V: VaultLedger + ?Sized,
{
    let mut balances = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        let balance = strategy.balance().await.map_err(|source| {
            SnapshotError::Strategy {
                strategy: strategy.name().to_string(),
                source,
            }
        })?;
        balances.push(balance);
    }

    let idle_cash = vault.agent_cash().await?;

    Ok(Snapshot { balances, idle_cash })
}

/// Lenient snapshot: every strategy is polled even when earlier reads
/// fail; failures are logged and carried per entry.
pub async fn take_lenient<V>(strategies: &[Arc<dyn Strategy>], vault: &V) -> LenientSnapshot
where
    V: VaultLedger + ?Sized,
{
    let mut balances = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        let result = strategy.balance().await;

        if let Err(error) = &result {
            warn!(
                strategy = strategy.name(),
                %error,
                "balance query failed, carrying the gap"
            );
        }

        balances.push(result);
    }

    let idle_cash = vault.agent_cash().await;

    if let Err(error) = &idle_cash {
        warn!(%error, "agent cash query failed, carrying the gap");
    }

    LenientSnapshot { balances, idle_cash }
}
