//! Vault reconciliation: compares the external ledger's debt figure
//! against the capital the agent can actually see, and submits the
//! difference as profit or loss.
//!
//! Reconciliation must never block or corrupt a rebalance cycle, so
//! every failure path degrades to a zero report instead of propagating.

use std::sync::Arc;

use tracing::{info, warn};

use crate::snapshot;
use crate::strategy::Strategy;
use crate::vault::VaultLedger;

/// Result of one reconciliation pass. At most one side is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitLoss {
    pub profit: f64,
    pub loss: f64,
}

impl ProfitLoss {
    pub const ZERO: Self = Self { profit: 0.0, loss: 0.0 };
}

/// Computes real debt (strategy balances plus agent idle cash), diffs
/// it against the recorded ledger debt, and submits the figure.
///
/// Any failure (a balance query, the debt read, or the submission)
/// returns [`ProfitLoss::ZERO`] without submitting anything further.
pub async fn report<V>(vault: &V, strategies: &[Arc<dyn Strategy>]) -> ProfitLoss
where
    V: VaultLedger + ?Sized,
{
    let observed = snapshot::take_lenient(strategies, vault).await;

    let mut real_debt = 0.0;
    for balance in observed.balances {
        match balance {
            Ok(balance) => real_debt += balance,
            // already logged by the snapshot walk
            Err(_) => return ProfitLoss::ZERO,
        }
    }

    match observed.idle_cash {
        Ok(idle_cash) => real_debt += idle_cash,
        Err(_) => return ProfitLoss::ZERO,
    }

    let recorded_debt = match vault.total_debt().await {
        Ok(debt) => debt,
        Err(error) => {
            warn!(%error, "ledger debt unavailable, skipping report");
            return ProfitLoss::ZERO;
        }
    };

    let difference = real_debt - recorded_debt;
    let result = if difference >= 0.0 {
        ProfitLoss { profit: difference, loss: 0.0 }
    } else {
        ProfitLoss { profit: 0.0, loss: -difference }
    };

    if let Err(error) = vault.update_debt(result.profit, result.loss).await {
        warn!(%error, "reconciliation submission failed");
        return ProfitLoss::ZERO;
    }

    info!(
        real_debt,
        recorded_debt,
        profit = result.profit,
        loss = result.loss,
        "reconciliation reported"
    );

    result
}
