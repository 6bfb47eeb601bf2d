//! Off-chain control loop of a yield-routing agent.
//!
//! A fixed-interval scheduler drives rebalance cycles: idle vault funds
//! are pulled into agent custody, the allocation optimizer binary-
//! searches the best achievable blended APY across the registered
//! strategies, and the orchestrator converges the real allocation onto
//! the plan with a withdraw phase followed by a deposit phase.

use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use tracing::info;

pub mod config;
pub mod defillama;
pub mod optimizer;
pub mod orchestrator;
pub mod reconcile;
pub mod scheduler;
pub mod snapshot;
pub mod strategy;
pub mod units;
pub mod vault;

pub use config::setup_tracing;

use crate::config::{Ctx, StrategyCtx};
use crate::defillama::DefillamaClient;
use crate::orchestrator::RebalanceOrchestrator;
use crate::scheduler::Scheduler;
use crate::strategy::Strategy;
use crate::strategy::aave::AaveV3UsdcStrategy;
use crate::vault::OffchainVault;

/// Builds the agent from its runtime context and runs the scheduler
/// until a shutdown signal arrives.
pub async fn launch(ctx: Ctx) -> anyhow::Result<()> {
    let signer = PrivateKeySigner::from_bytes(&ctx.agent_key)?;
    let agent = signer.address();

    info!(%agent, vault = %ctx.vault, "starting yield-routing agent");

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(ctx.rpc_url.clone());

    let vault = Arc::new(OffchainVault::new(
        provider.clone(),
        ctx.vault,
        ctx.token,
        ctx.token_decimals,
        agent,
    ));

    let yields = DefillamaClient::new()?;

    let mut strategies: Vec<Arc<dyn Strategy>> = Vec::new();
    for strategy in &ctx.strategies {
        match strategy {
            StrategyCtx::AaveV3Usdc { min_debt, max_debt } => {
                strategies.push(Arc::new(AaveV3UsdcStrategy::new(
                    provider.clone(),
                    yields.clone(),
                    agent,
                    *min_debt,
                    *max_debt,
                )));
            }
        }
    }

    info!(
        strategies = strategies.len(),
        interval = ?ctx.rebalance_interval,
        "strategy registry assembled"
    );

    let orchestrator = Arc::new(RebalanceOrchestrator::new(
        vault,
        strategies,
        ctx.orchestrator,
    ));
    let scheduler = Scheduler::new(orchestrator);

    tokio::select! {
        () = scheduler.run(ctx.rebalance_interval) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutdown signal received");
        }
    }

    Ok(())
}
