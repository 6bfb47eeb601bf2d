//! Rebalance orchestrator: drives one cycle from the current allocation
//! to the optimizer's target allocation.
//!
//! A cycle pulls idle vault funds into agent custody, computes the plan,
//! then runs the withdraw phase before the deposit phase so capital is
//! freed from over-allocated strategies before being committed
//! elsewhere. Strategy operations share the agent's single signing
//! identity and are issued strictly sequentially, with a settle delay
//! after each call so the next balance read observes settled state.
//!
//! Only optimizer query failures abort a cycle. Per-strategy operation
//! failures and idle pull failures are logged and swallowed, and
//! reconciliation degrades to a zero report on its own. There is no
//! terminal failure state: the next scheduled cycle always starts
//! fresh.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::optimizer::{self, AllocationPlan, OptimizerQueryError};
use crate::reconcile::{self, ProfitLoss};
use crate::snapshot::{self, SnapshotError};
use crate::strategy::Strategy;
use crate::vault::{VaultError, VaultLedger};

/// Cycles with less than one token unit deployable are no-ops.
const DEPLOYABLE_FLOOR: f64 = 1.0;

/// Idle vault funds below one token unit are left where they are.
const IDLE_PULL_FLOOR: f64 = 1.0;

/// Reserve kept out of the deployable total in real-balances mode.
const IDLE_BUFFER: f64 = 1.0;

/// Where the deployable total comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployableMode {
    /// The vault ledger's debt figure (the assets credited to the
    /// agent by external bookkeeping).
    #[default]
    VaultDebt,
    /// The sum of real strategy balances and agent idle cash, minus a
    /// one-unit buffer.
    RealBalances,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause after each issued strategy operation, bounding
    /// confirmation interference between sequential transactions from
    /// the same wallet.
    pub settle_delay: Duration,
    /// Bound on each vault/strategy mutation, confirmation included.
    pub operation_timeout: Duration,
    /// Bound on the whole optimization step; a stale plan is useless.
    pub optimize_timeout: Duration,
    pub deployable: DeployableMode,
    /// Run the vault reconciler at the end of each cycle.
    pub report_after_cycle: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(180),
            optimize_timeout: Duration::from_secs(120),
            deployable: DeployableMode::VaultDebt,
            report_after_cycle: false,
        }
    }
}

/// A failure that aborts the remainder of the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Optimize(#[from] OptimizerQueryError),
    #[error("balance snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("vault ledger query failed: {0}")]
    Vault(#[source] VaultError),
    #[error("{stage} timed out after {timeout:?}")]
    Timeout { stage: &'static str, timeout: Duration },
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Deployable total was below the one-unit floor; nothing queried,
    /// nothing moved.
    BelowFloor { deployable: f64 },
    Completed {
        apy: f64,
        /// Successfully issued withdrawals.
        withdrawals: usize,
        /// Successfully issued deposits.
        deposits: usize,
        report: Option<ProfitLoss>,
    },
}

pub struct RebalanceOrchestrator<V> {
    vault: Arc<V>,
    strategies: Vec<Arc<dyn Strategy>>,
    config: OrchestratorConfig,
}

impl<V> RebalanceOrchestrator<V>
where
    V: VaultLedger,
{
    pub fn new(vault: Arc<V>, strategies: Vec<Arc<dyn Strategy>>, config: OrchestratorConfig) -> Self {
        Self {
            vault,
            strategies,
            config,
        }
    }

    #[cfg(test)]
    pub(crate) fn vault(&self) -> &V {
        &self.vault
    }

    /// Runs one full rebalance cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        self.pull_idle().await;

        let deployable = self.deployable_total().await?;
        if deployable < DEPLOYABLE_FLOOR {
            debug!(deployable, "deployable total below floor, skipping cycle");
            return Ok(CycleOutcome::BelowFloor { deployable });
        }

        let plan = timeout(
            self.config.optimize_timeout,
            optimizer::optimize(&self.strategies, deployable),
        )
        .await
        .map_err(|_| CycleError::Timeout {
            stage: "optimization",
            timeout: self.config.optimize_timeout,
        })??;

        info!(
            apy = plan.apy,
            deployable,
            minimum_liquidity = plan.minimum_liquidity,
            "allocation plan computed"
        );

        let withdrawals = self.run_withdraw_phase(&plan).await;

        let remaining = self.agent_cash().await?;
        let deposits = self.run_deposit_phase(&plan, remaining).await?;

        let report = if self.config.report_after_cycle {
            Some(self.run_report().await)
        } else {
            None
        };

        Ok(CycleOutcome::Completed {
            apy: plan.apy,
            withdrawals,
            deposits,
            report,
        })
    }

    /// Moves idle vault funds into agent custody. Non-fatal: the cycle
    /// proceeds with whatever deployable total already exists.
    async fn pull_idle(&self) {
        let idle = match timeout(self.config.operation_timeout, self.vault.total_idle()).await {
            Err(_) => {
                warn!(
                    timeout = ?self.config.operation_timeout,
                    "idle balance query timed out, continuing cycle"
                );
                return;
            }
            Ok(Err(error)) => {
                warn!(%error, "idle balance query failed, continuing cycle");
                return;
            }
            Ok(Ok(idle)) => idle,
        };

        if idle < IDLE_PULL_FLOOR {
            return;
        }

        match timeout(self.config.operation_timeout, self.vault.agent_withdraw(idle)).await {
            Err(_) => warn!(
                idle,
                timeout = ?self.config.operation_timeout,
                "idle pull timed out, continuing cycle"
            ),
            Ok(Err(error)) => warn!(idle, %error, "idle pull failed, continuing cycle"),
            Ok(Ok(())) => {}
        }
    }

    async fn deployable_total(&self) -> Result<f64, CycleError> {
        match self.config.deployable {
            DeployableMode::VaultDebt => {
                timeout(self.config.operation_timeout, self.vault.total_debt())
                    .await
                    .map_err(|_| CycleError::Timeout {
                        stage: "deployable total",
                        timeout: self.config.operation_timeout,
                    })?
                    .map_err(CycleError::Vault)
            }
            DeployableMode::RealBalances => {
                let observed = timeout(
                    self.config.optimize_timeout,
                    snapshot::take(&self.strategies, self.vault.as_ref()),
                )
                .await
                .map_err(|_| CycleError::Timeout {
                    stage: "balance snapshot",
                    timeout: self.config.optimize_timeout,
                })??;

                Ok(observed.total() - IDLE_BUFFER)
            }
        }
    }

    /// Frees capital from every over-allocated strategy. Each call is
    /// isolated; returns the number of successful withdrawals.
    async fn run_withdraw_phase(&self, plan: &AllocationPlan) -> usize {
        let mut issued = 0;

        for (strategy, entry) in self.strategies.iter().zip(&plan.entries) {
            let target = entry.target_liquidity();
            if entry.current_liquidity <= target {
                continue;
            }

            let excess = entry.current_liquidity - target;
            debug!(
                strategy = strategy.name(),
                amount = excess,
                "withdrawing excess allocation"
            );

            match timeout(self.config.operation_timeout, strategy.withdraw(excess)).await {
                Err(_) => error!(
                    strategy = strategy.name(),
                    timeout = ?self.config.operation_timeout,
                    "withdrawal timed out"
                ),
                Ok(Err(error)) => error!(strategy = strategy.name(), %error, "withdrawal failed"),
                Ok(Ok(())) => issued += 1,
            }

            sleep(self.config.settle_delay).await;
        }

        issued
    }

    /// Fills every under-allocated strategy from the agent's remaining
    /// cash, re-reading the real balance after each operation rather
    /// than trusting local subtraction.
    async fn run_deposit_phase(
        &self,
        plan: &AllocationPlan,
        mut remaining: f64,
    ) -> Result<usize, CycleError> {
        let mut issued = 0;

        for (strategy, entry) in self.strategies.iter().zip(&plan.entries) {
            let target = entry.target_liquidity();
            if entry.current_liquidity >= target {
                continue;
            }

            let deficit = target - entry.current_liquidity;
            let amount = deficit.min(remaining);
            debug!(
                strategy = strategy.name(),
                amount,
                deficit,
                remaining,
                "depositing toward target allocation"
            );

            match timeout(self.config.operation_timeout, strategy.deposit(amount)).await {
                Err(_) => error!(
                    strategy = strategy.name(),
                    timeout = ?self.config.operation_timeout,
                    "deposit timed out"
                ),
                Ok(Err(error)) => error!(strategy = strategy.name(), %error, "deposit failed"),
                Ok(Ok(())) => issued += 1,
            }

            sleep(self.config.settle_delay).await;

            remaining = self.agent_cash().await?;
        }

        Ok(issued)
    }

    async fn agent_cash(&self) -> Result<f64, CycleError> {
        timeout(self.config.operation_timeout, self.vault.agent_cash())
            .await
            .map_err(|_| CycleError::Timeout {
                stage: "agent cash",
                timeout: self.config.operation_timeout,
            })?
            .map_err(CycleError::Vault)
    }

    async fn run_report(&self) -> ProfitLoss {
        match timeout(
            self.config.optimize_timeout,
            reconcile::report(self.vault.as_ref(), &self.strategies),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout = ?self.config.optimize_timeout,
                    "reconciliation timed out"
                );
                ProfitLoss::ZERO
            }
        }
    }
}
