//! Allocation optimizer: constrained binary search for the best
//! achievable blended APY.
//!
//! Capacity at a target APY is monotone non-increasing per strategy
//! (higher yield target means less room before yield compresses), so
//! the feasibility of absorbing the deployable budget is monotone in
//! the candidate rate, which is what licenses the binary search.
//!
//! The budget walk is greedy and order-dependent on purpose: strategies
//! registered earlier get priority claim on scarce budget. Reordering
//! the registry changes the plan even when physical capacities do not.

use std::sync::Arc;

use tracing::debug;

use crate::strategy::{Strategy, StrategyQueryError};

/// Binary search bounds for the blended APY, in percent.
const APY_LOWER_BOUND: f64 = 0.0;
const APY_UPPER_BOUND: f64 = 100.0;

/// Stopping tolerance of the APY search.
pub const APY_TOLERANCE: f64 = 0.001;

/// A strategy failed to answer a capacity/yield query during
/// optimization. No partial plan is produced.
#[derive(Debug, thiserror::Error)]
#[error("strategy {strategy} failed to answer {query}: {source}")]
pub struct OptimizerQueryError {
    pub strategy: String,
    pub query: &'static str,
    #[source]
    pub source: StrategyQueryError,
}

/// Per-strategy slice of an [`AllocationPlan`], in human token units.
/// Indexed parallel to the registry; never mutated after the run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    /// Budget assigned to this strategy at the plan's APY, capped by the
    /// remaining budget during the walk. Non-negative.
    pub available_liquidity: f64,
    /// The strategy's real balance at plan time.
    pub current_liquidity: f64,
    /// Capital the strategy must always retain.
    pub minimum_liquidity: f64,
}

impl PlanEntry {
    /// Target capital for this strategy: its allocation plus its
    /// retained minimum.
    pub fn target_liquidity(&self) -> f64 {
        self.available_liquidity + self.minimum_liquidity
    }
}

/// The optimizer's output for one cycle: computed fresh, consumed
/// immediately, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    /// Maximal blended rate at which the budget is fully absorbable,
    /// bounded in `[0, 100]`.
    pub apy: f64,
    /// Sum of per-strategy minimums.
    pub minimum_liquidity: f64,
    pub entries: Vec<PlanEntry>,
}

/// Computes the target allocation for `total_asset` across the
/// registered strategies.
///
/// Queries are read-only; any failing query aborts the whole
/// optimization. An empty registry or a budget that cannot clear the
/// summed minimums yields an all-zero plan at `apy = 0` without issuing
/// capacity queries.
pub async fn optimize(
    strategies: &[Arc<dyn Strategy>],
    total_asset: f64,
) -> Result<AllocationPlan, OptimizerQueryError> {
    if strategies.is_empty() {
        return Ok(AllocationPlan {
            apy: 0.0,
            minimum_liquidity: 0.0,
            entries: Vec::new(),
        });
    }

    let mut minimums = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let minimum = strategy.minimum_liquidity().await.map_err(|source| {
            OptimizerQueryError {
                strategy: strategy.name().to_string(),
                query: "minimum_liquidity",
                source,
            }
        })?;
        minimums.push(minimum);
    }
    let minimum_total: f64 = minimums.iter().sum();

    let budget = total_asset - minimum_total;
    let mut allocations = vec![0.0; strategies.len()];
    let mut apy = 0.0;

    if budget > 0.0 {
        let mut lower = APY_LOWER_BOUND;
        let mut upper = APY_UPPER_BOUND;

        while lower < upper - APY_TOLERANCE {
            let candidate = (lower + upper) / 2.0;

            match budget_walk(strategies, candidate, budget).await? {
                Some(pass) => {
                    lower = candidate;
                    allocations = pass;
                }
                None => upper = candidate,
            }
        }

        apy = lower;
        debug!(apy, budget, "APY search converged");
    }

    let mut entries = Vec::with_capacity(strategies.len());
    for (index, strategy) in strategies.iter().enumerate() {
        let balance = strategy.balance().await.map_err(|source| OptimizerQueryError {
            strategy: strategy.name().to_string(),
            query: "balance",
            source,
        })?;

        entries.push(PlanEntry {
            available_liquidity: allocations[index],
            current_liquidity: balance,
            minimum_liquidity: minimums[index],
        });
    }

    Ok(AllocationPlan {
        apy,
        minimum_liquidity: minimum_total,
        entries,
    })
}

/// Walks the registry in order handing out `budget` against each
/// strategy's capacity at `candidate`. Returns the per-strategy
/// allocations when the budget is fully absorbed, `None` when capacity
/// runs out first.
async fn budget_walk(
    strategies: &[Arc<dyn Strategy>],
    candidate: f64,
    budget: f64,
) -> Result<Option<Vec<f64>>, OptimizerQueryError> {
    let mut allocations = vec![0.0; strategies.len()];
    let mut remaining = budget;

    for (index, strategy) in strategies.iter().enumerate() {
        let capacity = strategy
            .liquidity_available_at_apy(candidate)
            .await
            .map_err(|source| OptimizerQueryError {
                strategy: strategy.name().to_string(),
                query: "liquidity_available_at_apy",
                source,
            })?
            .available_liquidity;

        if remaining > capacity {
            allocations[index] = capacity;
            remaining -= capacity;
        } else {
            // this strategy absorbs the rest; later ones get nothing
            allocations[index] = remaining;
            remaining = 0.0;
            return Ok(Some(allocations));
        }
    }

    Ok(if remaining <= 0.0 { Some(allocations) } else { None })
}
