//! Vault ledger capability and its on-chain implementation.
//!
//! The ledger is the external bookkeeping the agent serves: the debt
//! figure credited to the agent, idle funds awaiting pull, the pull
//! itself, and the reconciliation write. The agent's own token balance
//! lives here too, because the vault service owns the agent identity
//! and unit-token convention.

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use tracing::info;

use crate::units::{UnitsError, from_base_units, to_base_units};

#[cfg(test)]
pub(crate) mod mock;

sol!(
    #![sol(all_derives = true, rpc)]
    interface IOffchainVault {
        function totalDebt() external view returns (uint256);
        function totalIdle() external view returns (uint256);
        function agentWithdraw(uint256 amount) external;
        function updateDebt(uint256 profit, uint256 loss) external;
    }
);

sol!(
    #![sol(all_derives = true, rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }
);

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("chain call failed: {0}")]
    Contract(#[from] alloy::contract::Error),
    #[error("transaction did not confirm: {0}")]
    Confirmation(#[from] alloy::providers::PendingTransactionError),
    #[error("transaction reverted: {tx_hash}")]
    Reverted { tx_hash: TxHash },
    #[error("amount conversion failed: {0}")]
    Units(#[from] UnitsError),
    #[error("ledger unavailable: {reason}")]
    Unavailable { reason: String },
}

/// External vault bookkeeping consumed by the orchestrator, in human
/// token units.
#[async_trait]
pub trait VaultLedger: Send + Sync {
    /// Assets currently credited to the agent by external bookkeeping.
    async fn total_debt(&self) -> Result<f64, VaultError>;

    /// Assets sitting idle in the vault, awaiting pull.
    async fn total_idle(&self) -> Result<f64, VaultError>;

    /// Pulls idle funds into agent custody.
    async fn agent_withdraw(&self, amount: f64) -> Result<(), VaultError>;

    /// Reconciliation write; exactly one of `profit`/`loss` is non-zero
    /// (or both are zero for a flat report).
    async fn update_debt(&self, profit: f64, loss: f64) -> Result<(), VaultError>;

    /// The agent wallet's idle token balance.
    async fn agent_cash(&self) -> Result<f64, VaultError>;
}

/// Alloy-backed ledger over the off-chain strategy vault contract.
pub struct OffchainVault<P> {
    provider: P,
    vault: Address,
    token: Address,
    token_decimals: u8,
    agent: Address,
}

impl<P> OffchainVault<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P, vault: Address, token: Address, token_decimals: u8, agent: Address) -> Self {
        Self {
            provider,
            vault,
            token,
            token_decimals,
            agent,
        }
    }

    fn check_receipt(
        receipt: alloy::rpc::types::TransactionReceipt,
    ) -> Result<TxHash, VaultError> {
        if !receipt.status() {
            return Err(VaultError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }
        Ok(receipt.transaction_hash)
    }
}

#[async_trait]
impl<P> VaultLedger for OffchainVault<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn total_debt(&self) -> Result<f64, VaultError> {
        let vault = IOffchainVault::new(self.vault, self.provider.clone());
        let debt = vault.totalDebt().call().await?;
        Ok(from_base_units(debt, self.token_decimals)?)
    }

    async fn total_idle(&self) -> Result<f64, VaultError> {
        let vault = IOffchainVault::new(self.vault, self.provider.clone());
        let idle = vault.totalIdle().call().await?;
        Ok(from_base_units(idle, self.token_decimals)?)
    }

    async fn agent_withdraw(&self, amount: f64) -> Result<(), VaultError> {
        let raw = to_base_units(amount, self.token_decimals)?;

        let vault = IOffchainVault::new(self.vault, self.provider.clone());
        let receipt = vault
            .agentWithdraw(raw)
            .send()
            .await?
            .get_receipt()
            .await?;
        let tx_hash = Self::check_receipt(receipt)?;

        info!(%tx_hash, amount, "pulled idle funds from vault into agent custody");
        Ok(())
    }

    async fn update_debt(&self, profit: f64, loss: f64) -> Result<(), VaultError> {
        let raw_profit = to_base_units(profit, self.token_decimals)?;
        let raw_loss = to_base_units(loss, self.token_decimals)?;

        let vault = IOffchainVault::new(self.vault, self.provider.clone());
        let receipt = vault
            .updateDebt(raw_profit, raw_loss)
            .send()
            .await?
            .get_receipt()
            .await?;
        let tx_hash = Self::check_receipt(receipt)?;

        info!(%tx_hash, profit, loss, "submitted reconciliation report");
        Ok(())
    }

    async fn agent_cash(&self) -> Result<f64, VaultError> {
        let token = IERC20::new(self.token, self.provider.clone());
        let balance: U256 = token.balanceOf(self.agent).call().await?;
        Ok(from_base_units(balance, self.token_decimals)?)
    }
}
