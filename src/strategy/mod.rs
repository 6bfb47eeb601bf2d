//! Yield strategy capability interface.
//!
//! Every venue the agent can route capital into implements [`Strategy`]:
//! read-only capacity/yield queries consumed by the allocation optimizer,
//! plus the deposit/withdraw operations driven by the rebalance
//! orchestrator. Strategies are selected at construction time and held in
//! registration order; the registry is never reordered, because the
//! optimizer's greedy budget walk gives earlier strategies priority claim
//! on scarce budget.

use alloy::primitives::TxHash;
use async_trait::async_trait;

use crate::defillama::DefillamaError;
use crate::units::UnitsError;

pub mod aave;
pub(crate) mod cache;
#[cfg(test)]
pub(crate) mod mock;

/// A strategy failed to answer a read-only capacity/yield/balance query.
///
/// Query failures are cycle-fatal when they occur inside the optimizer:
/// no partial plan is ever produced.
#[derive(Debug, thiserror::Error)]
pub enum StrategyQueryError {
    #[error("target APY must be positive, got {0}")]
    NonPositiveTargetApy(f64),
    #[error("yield data unavailable: {0}")]
    YieldData(#[from] DefillamaError),
    #[error("chain call failed: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("balance conversion failed: {0}")]
    Units(#[from] UnitsError),
    #[error("strategy unavailable: {reason}")]
    Unavailable { reason: String },
}

/// A deposit or withdraw call failed.
///
/// Operation failures are isolated per strategy: the orchestrator logs
/// them and moves on, and the affected strategy carries its pre-cycle
/// balance into the next cycle's plan.
#[derive(Debug, thiserror::Error)]
pub enum StrategyOperationError {
    #[error("amount conversion failed: {0}")]
    Units(#[from] UnitsError),
    #[error("chain call failed: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("transaction did not confirm: {0}")]
    Confirmation(#[from] alloy::providers::PendingTransactionError),
    #[error("transaction reverted: {tx_hash}")]
    Reverted { tx_hash: TxHash },
    #[error("operation rejected: {reason}")]
    Rejected { reason: String },
}

/// Capacity headroom reported by a strategy for a target APY.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityAtApy {
    /// Liquidity the strategy can absorb before its yield compresses to
    /// the queried target. Non-negative.
    pub available_liquidity: f64,
}

/// Capability contract every yield venue implements.
///
/// Queries are read-only and side-effect free; operations share the
/// agent's single signing identity and are therefore only ever issued
/// sequentially by the orchestrator. Amounts are human token units.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable identifier for logging.
    fn name(&self) -> &str;

    /// Current annualized yield. May be served from the strategy's
    /// internal cache.
    async fn apy(&self) -> Result<f64, StrategyQueryError>;

    /// Current total value locked, informational.
    async fn tvl(&self) -> Result<f64, StrategyQueryError>;

    /// Capacity headroom before yield compresses to `target_apy`.
    /// Must be monotone non-increasing in `target_apy`; `target_apy`
    /// must be positive.
    async fn liquidity_available_at_apy(
        &self,
        target_apy: f64,
    ) -> Result<LiquidityAtApy, StrategyQueryError>;

    /// Capital currently held by this strategy, in the vault's unit
    /// token.
    async fn balance(&self) -> Result<f64, StrategyQueryError>;

    /// Capital this strategy must always retain.
    async fn minimum_liquidity(&self) -> Result<f64, StrategyQueryError>;

    async fn deposit(&self, amount: f64) -> Result<(), StrategyOperationError>;

    async fn withdraw(&self, amount: f64) -> Result<(), StrategyOperationError>;
}
