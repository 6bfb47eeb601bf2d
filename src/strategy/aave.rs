//! Aave V3 USDC lending strategy on Base.
//!
//! Yield figures come from the DefiLlama pool for this market and are
//! cached per instance; capital sits in the Aave pool as aUSDC held by
//! the agent wallet. Capacity at a target APY follows the dilution
//! model: depositing liquidity dilutes the pool's reward rate, so the
//! headroom before yield compresses to `target` is the TVL delta that
//! keeps `tvl * apy` constant.

use alloy::primitives::{Address, U256, address};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use tracing::{debug, info};

use super::cache::MetricCache;
use super::{LiquidityAtApy, Strategy, StrategyOperationError, StrategyQueryError};
use crate::defillama::{DefillamaClient, YieldPoolStats};
use crate::units::{from_base_units, to_base_units};

sol!(
    #![sol(all_derives = true, rpc)]
    interface IPool {
        struct ReserveConfigurationMap {
            uint256 data;
        }

        struct ReserveDataLegacy {
            ReserveConfigurationMap configuration;
            uint128 liquidityIndex;
            uint128 currentLiquidityRate;
            uint128 variableBorrowIndex;
            uint128 currentVariableBorrowRate;
            uint128 currentStableBorrowRate;
            uint40 lastUpdateTimestamp;
            uint16 id;
            address aTokenAddress;
            address stableDebtTokenAddress;
            address variableDebtTokenAddress;
            address interestRateStrategyAddress;
            uint128 accruedToTreasury;
            uint128 unbacked;
            uint128 isolationModeTotalDebt;
        }

        function getReserveData(address asset) external view returns (ReserveDataLegacy memory);
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
    }
);

sol!(
    #![sol(all_derives = true, rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
);

const STRATEGY_NAME: &str = "aave-v3-usdc-base";

/// USDC on Base.
const USDC_TOKEN: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// Aave V3 pool proxy on Base.
const POOL_PROXY: Address = address!("0xA238Dd80C259a72e81d7e4664a9801593F98d1c5");

const USDC_DECIMALS: u8 = 6;

/// DefiLlama pool code for the Aave V3 USDC market on Base.
const DEFILLAMA_POOL: &str = "7e0661bf-8cf3-45e6-9424-31916d4c7b84";

/// Operations below one token unit are dust and skipped outright.
const MIN_OPERATION_AMOUNT: f64 = 1.0;

pub struct AaveV3UsdcStrategy<P> {
    provider: P,
    yields: DefillamaClient,
    agent: Address,
    min_debt: f64,
    max_debt: f64,
    apy_cache: MetricCache,
    tvl_cache: MetricCache,
}

impl<P> AaveV3UsdcStrategy<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(
        provider: P,
        yields: DefillamaClient,
        agent: Address,
        min_debt: f64,
        max_debt: f64,
    ) -> Self {
        Self {
            provider,
            yields,
            agent,
            min_debt,
            max_debt,
            apy_cache: MetricCache::new(),
            tvl_cache: MetricCache::new(),
        }
    }

    /// Fetches the pool's chart point and refills both metric caches
    /// from the single response.
    async fn refresh_metrics(&self) -> Result<YieldPoolStats, StrategyQueryError> {
        let stats = self.yields.yield_pool_stats(DEFILLAMA_POOL).await?;

        self.apy_cache.set(stats.apy);
        self.tvl_cache.set(stats.tvl_usd);

        Ok(stats)
    }

    async fn cached_apy(&self) -> Result<f64, StrategyQueryError> {
        if let Some(apy) = self.apy_cache.get() {
            return Ok(apy);
        }

        Ok(self.refresh_metrics().await?.apy)
    }

    async fn cached_tvl(&self) -> Result<f64, StrategyQueryError> {
        if let Some(tvl) = self.tvl_cache.get() {
            return Ok(tvl);
        }

        Ok(self.refresh_metrics().await?.tvl_usd)
    }

    /// Tops up the pool's USDC allowance when it cannot cover `amount`.
    async fn ensure_allowance(&self, amount: U256) -> Result<(), StrategyOperationError> {
        let usdc = IERC20::new(USDC_TOKEN, self.provider.clone());

        let allowance = usdc.allowance(self.agent, POOL_PROXY).call().await?;
        if allowance >= amount {
            return Ok(());
        }

        info!(strategy = STRATEGY_NAME, "approving pool USDC allowance");

        let receipt = usdc
            .approve(POOL_PROXY, U256::MAX)
            .send()
            .await?
            .get_receipt()
            .await?;

        if !receipt.status() {
            return Err(StrategyOperationError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }

        info!(
            strategy = STRATEGY_NAME,
            tx_hash = %receipt.transaction_hash,
            "USDC allowance approved"
        );

        Ok(())
    }
}

#[async_trait]
impl<P> Strategy for AaveV3UsdcStrategy<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    async fn apy(&self) -> Result<f64, StrategyQueryError> {
        self.cached_apy().await
    }

    async fn tvl(&self) -> Result<f64, StrategyQueryError> {
        self.cached_tvl().await
    }

    async fn liquidity_available_at_apy(
        &self,
        target_apy: f64,
    ) -> Result<LiquidityAtApy, StrategyQueryError> {
        if target_apy <= 0.0 {
            return Err(StrategyQueryError::NonPositiveTargetApy(target_apy));
        }

        let tvl = self.cached_tvl().await?;
        let apy = self.cached_apy().await?;

        // Constant-reward dilution: required_tvl * target == tvl * apy
        let required_tvl = tvl * apy / target_apy;
        let delta = required_tvl - tvl;

        Ok(LiquidityAtApy {
            available_liquidity: floor_to_cents(delta.clamp(0.0, self.max_debt)),
        })
    }

    async fn balance(&self) -> Result<f64, StrategyQueryError> {
        let pool = IPool::new(POOL_PROXY, self.provider.clone());
        let reserve = pool.getReserveData(USDC_TOKEN).call().await?;

        let a_token = IERC20::new(reserve.aTokenAddress, self.provider.clone());
        let balance = a_token.balanceOf(self.agent).call().await?;

        Ok(from_base_units(balance, USDC_DECIMALS)?)
    }

    async fn minimum_liquidity(&self) -> Result<f64, StrategyQueryError> {
        Ok(self.min_debt)
    }

    async fn deposit(&self, amount: f64) -> Result<(), StrategyOperationError> {
        if amount < MIN_OPERATION_AMOUNT {
            debug!(
                strategy = STRATEGY_NAME,
                amount, "deposit below dust floor, skipping"
            );
            return Ok(());
        }

        let raw = to_base_units(amount, USDC_DECIMALS)?;

        self.ensure_allowance(raw).await?;

        info!(strategy = STRATEGY_NAME, amount, "depositing into Aave pool");

        let pool = IPool::new(POOL_PROXY, self.provider.clone());
        let receipt = pool
            .supply(USDC_TOKEN, raw, self.agent, 0)
            .send()
            .await?
            .get_receipt()
            .await?;

        if !receipt.status() {
            return Err(StrategyOperationError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }

        info!(
            strategy = STRATEGY_NAME,
            tx_hash = %receipt.transaction_hash,
            "deposit confirmed"
        );

        Ok(())
    }

    async fn withdraw(&self, amount: f64) -> Result<(), StrategyOperationError> {
        if amount < MIN_OPERATION_AMOUNT {
            debug!(
                strategy = STRATEGY_NAME,
                amount, "withdrawal below dust floor, skipping"
            );
            return Ok(());
        }

        let raw = to_base_units(amount, USDC_DECIMALS)?;

        info!(strategy = STRATEGY_NAME, amount, "withdrawing from Aave pool");

        let pool = IPool::new(POOL_PROXY, self.provider.clone());
        let receipt = pool
            .withdraw(USDC_TOKEN, raw, self.agent)
            .send()
            .await?
            .get_receipt()
            .await?;

        if !receipt.status() {
            return Err(StrategyOperationError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }

        info!(
            strategy = STRATEGY_NAME,
            tx_hash = %receipt.transaction_hash,
            "withdrawal confirmed"
        );

        Ok(())
    }
}

/// Floors a human-unit amount to two decimal places, matching the
/// precision the capacity figures are reported at.
fn floor_to_cents(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}
