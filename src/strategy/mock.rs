//! Mock strategy for exercising the optimizer, orchestrator, and
//! scheduler without a chain.
//!
//! The capacity curve uses the same constant-reward dilution model as
//! the Aave strategy, so closed-form expectations carry over. Deposits
//! and withdrawals move funds between the strategy balance and an
//! optionally shared agent wallet cell, letting tests observe the
//! orchestrator's cash re-reads.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{LiquidityAtApy, Strategy, StrategyOperationError, StrategyQueryError};

/// Shared cash cell standing in for the agent wallet's token balance.
pub(crate) type WalletCell = Arc<Mutex<f64>>;

pub(crate) struct MockStrategy {
    name: String,
    apy: f64,
    tvl: f64,
    max_capacity: f64,
    flat_capacity: Option<f64>,
    minimum_liquidity: f64,
    balance: Mutex<f64>,
    wallet: Option<WalletCell>,
    fail_queries: AtomicBool,
    fail_balance: AtomicBool,
    fail_deposit: AtomicBool,
    fail_withdraw: AtomicBool,
    liquidity_queries: AtomicUsize,
    balance_queries: AtomicUsize,
    deposits: Mutex<Vec<f64>>,
    withdrawals: Mutex<Vec<f64>>,
    operation_log: Option<Arc<Mutex<Vec<String>>>>,
    operation_delay: Option<std::time::Duration>,
}

impl MockStrategy {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            apy: 5.0,
            tvl: 1000.0,
            max_capacity: f64::MAX,
            flat_capacity: None,
            minimum_liquidity: 0.0,
            balance: Mutex::new(0.0),
            wallet: None,
            fail_queries: AtomicBool::new(false),
            fail_balance: AtomicBool::new(false),
            fail_deposit: AtomicBool::new(false),
            fail_withdraw: AtomicBool::new(false),
            liquidity_queries: AtomicUsize::new(0),
            balance_queries: AtomicUsize::new(0),
            deposits: Mutex::new(Vec::new()),
            withdrawals: Mutex::new(Vec::new()),
            operation_log: None,
            operation_delay: None,
        }
    }

    /// Sets the yield curve: current APY and TVL for the dilution model.
    pub(crate) fn with_curve(mut self, apy: f64, tvl: f64) -> Self {
        self.apy = apy;
        self.tvl = tvl;
        self
    }

    pub(crate) fn with_max_capacity(mut self, max_capacity: f64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Reports the same capacity at every target rate (trivially
    /// monotone non-increasing), for tests that need headroom to
    /// survive convergence.
    pub(crate) fn with_flat_capacity(mut self, capacity: f64) -> Self {
        self.flat_capacity = Some(capacity);
        self
    }

    pub(crate) fn with_minimum_liquidity(mut self, minimum: f64) -> Self {
        self.minimum_liquidity = minimum;
        self
    }

    pub(crate) fn with_balance(self, balance: f64) -> Self {
        *self.balance.lock().unwrap() = balance;
        self
    }

    /// Shares the agent wallet cell so operations move real cash.
    pub(crate) fn with_wallet(mut self, wallet: WalletCell) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Shares a cross-strategy log recording operation order.
    pub(crate) fn with_operation_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.operation_log = Some(log);
        self
    }

    /// Makes deposits and withdrawals stall for `delay` before
    /// completing, simulating slow transaction confirmation.
    pub(crate) fn with_operation_delay(mut self, delay: std::time::Duration) -> Self {
        self.operation_delay = Some(delay);
        self
    }

    pub(crate) fn failing_queries(self) -> Self {
        self.fail_queries.store(true, Ordering::SeqCst);
        self
    }

    /// Fails only the balance query, leaving capacity and minimum
    /// queries healthy.
    pub(crate) fn failing_balance(self) -> Self {
        self.fail_balance.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_deposit(self) -> Self {
        self.fail_deposit.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_withdraw(self) -> Self {
        self.fail_withdraw.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn liquidity_query_count(&self) -> usize {
        self.liquidity_queries.load(Ordering::SeqCst)
    }

    pub(crate) fn balance_query_count(&self) -> usize {
        self.balance_queries.load(Ordering::SeqCst)
    }

    pub(crate) fn deposit_calls(&self) -> Vec<f64> {
        self.deposits.lock().unwrap().clone()
    }

    pub(crate) fn withdraw_calls(&self) -> Vec<f64> {
        self.withdrawals.lock().unwrap().clone()
    }

    fn query_guard(&self) -> Result<(), StrategyQueryError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StrategyQueryError::Unavailable {
                reason: format!("{} is offline", self.name),
            });
        }
        Ok(())
    }

    fn log_operation(&self, operation: &str, amount: f64) {
        if let Some(log) = &self.operation_log {
            log.lock()
                .unwrap()
                .push(format!("{}:{operation}:{amount}", self.name));
        }
    }
}

#[async_trait]
impl Strategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apy(&self) -> Result<f64, StrategyQueryError> {
        self.query_guard()?;
        Ok(self.apy)
    }

    async fn tvl(&self) -> Result<f64, StrategyQueryError> {
        self.query_guard()?;
        Ok(self.tvl)
    }

    async fn liquidity_available_at_apy(
        &self,
        target_apy: f64,
    ) -> Result<LiquidityAtApy, StrategyQueryError> {
        self.liquidity_queries.fetch_add(1, Ordering::SeqCst);
        self.query_guard()?;

        if target_apy <= 0.0 {
            return Err(StrategyQueryError::NonPositiveTargetApy(target_apy));
        }

        if let Some(capacity) = self.flat_capacity {
            return Ok(LiquidityAtApy { available_liquidity: capacity });
        }

        let delta = self.tvl * self.apy / target_apy - self.tvl;

        Ok(LiquidityAtApy {
            available_liquidity: delta.clamp(0.0, self.max_capacity),
        })
    }

    async fn balance(&self) -> Result<f64, StrategyQueryError> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        self.query_guard()?;

        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(StrategyQueryError::Unavailable {
                reason: format!("{} balance is unreadable", self.name),
            });
        }

        Ok(*self.balance.lock().unwrap())
    }

    async fn minimum_liquidity(&self) -> Result<f64, StrategyQueryError> {
        self.query_guard()?;
        Ok(self.minimum_liquidity)
    }

    async fn deposit(&self, amount: f64) -> Result<(), StrategyOperationError> {
        self.deposits.lock().unwrap().push(amount);
        self.log_operation("deposit", amount);

        if let Some(delay) = self.operation_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_deposit.load(Ordering::SeqCst) {
            return Err(StrategyOperationError::Rejected {
                reason: format!("{} rejected deposit", self.name),
            });
        }

        if let Some(wallet) = &self.wallet {
            *wallet.lock().unwrap() -= amount;
        }
        *self.balance.lock().unwrap() += amount;

        Ok(())
    }

    async fn withdraw(&self, amount: f64) -> Result<(), StrategyOperationError> {
        self.withdrawals.lock().unwrap().push(amount);
        self.log_operation("withdraw", amount);

        if let Some(delay) = self.operation_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_withdraw.load(Ordering::SeqCst) {
            return Err(StrategyOperationError::Rejected {
                reason: format!("{} rejected withdrawal", self.name),
            });
        }

        if let Some(wallet) = &self.wallet {
            *wallet.lock().unwrap() += amount;
        }
        *self.balance.lock().unwrap() -= amount;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capacity_curve_is_monotone_non_increasing() {
        let strategy = MockStrategy::new("m").with_curve(10.0, 1000.0);

        let mut previous = f64::MAX;
        for target in [1.0, 2.0, 5.0, 10.0, 20.0, 50.0] {
            let capacity = strategy
                .liquidity_available_at_apy(target)
                .await
                .unwrap()
                .available_liquidity;
            assert!(capacity <= previous, "capacity rose between targets");
            previous = capacity;
        }
    }

    #[tokio::test]
    async fn operations_move_funds_through_the_shared_wallet() {
        let wallet: WalletCell = Arc::new(Mutex::new(100.0));
        let strategy = MockStrategy::new("m")
            .with_balance(50.0)
            .with_wallet(Arc::clone(&wallet));

        strategy.deposit(30.0).await.unwrap();
        assert_eq!(*wallet.lock().unwrap(), 70.0);
        assert_eq!(strategy.balance().await.unwrap(), 80.0);

        strategy.withdraw(10.0).await.unwrap();
        assert_eq!(*wallet.lock().unwrap(), 80.0);
        assert_eq!(strategy.balance().await.unwrap(), 70.0);
    }

    #[tokio::test]
    async fn failing_operations_still_record_calls() {
        let strategy = MockStrategy::new("m").failing_withdraw();

        let result = strategy.withdraw(5.0).await;

        assert!(matches!(result, Err(StrategyOperationError::Rejected { .. })));
        assert_eq!(strategy.withdraw_calls(), vec![5.0]);
    }

    #[tokio::test]
    async fn failing_queries_reject_every_read() {
        let strategy = MockStrategy::new("m").failing_queries();

        assert!(strategy.apy().await.is_err());
        assert!(strategy.balance().await.is_err());
        assert!(strategy.minimum_liquidity().await.is_err());
        assert!(strategy.liquidity_available_at_apy(5.0).await.is_err());
    }
}
