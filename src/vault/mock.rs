//! Mock vault ledger for orchestrator, reconciler, and scheduler tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{VaultError, VaultLedger};
use crate::strategy::mock::WalletCell;

pub(crate) struct MockVault {
    total_debt: Mutex<f64>,
    total_idle: Mutex<f64>,
    cash: WalletCell,
    idle_query_delay: Option<Duration>,
    fail_total_debt: AtomicBool,
    fail_total_idle: AtomicBool,
    fail_agent_withdraw: AtomicBool,
    fail_update_debt: AtomicBool,
    fail_agent_cash: AtomicBool,
    idle_queries: AtomicUsize,
    agent_withdrawals: Mutex<Vec<f64>>,
    debt_updates: Mutex<Vec<(f64, f64)>>,
}

impl MockVault {
    pub(crate) fn new() -> Self {
        Self {
            total_debt: Mutex::new(0.0),
            total_idle: Mutex::new(0.0),
            cash: Arc::new(Mutex::new(0.0)),
            idle_query_delay: None,
            fail_total_debt: AtomicBool::new(false),
            fail_total_idle: AtomicBool::new(false),
            fail_agent_withdraw: AtomicBool::new(false),
            fail_update_debt: AtomicBool::new(false),
            fail_agent_cash: AtomicBool::new(false),
            idle_queries: AtomicUsize::new(0),
            agent_withdrawals: Mutex::new(Vec::new()),
            debt_updates: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_total_debt(self, debt: f64) -> Self {
        *self.total_debt.lock().unwrap() = debt;
        self
    }

    pub(crate) fn with_total_idle(self, idle: f64) -> Self {
        *self.total_idle.lock().unwrap() = idle;
        self
    }

    pub(crate) fn with_cash(self, cash: f64) -> Self {
        *self.cash.lock().unwrap() = cash;
        self
    }

    /// Shares the agent wallet cell with mock strategies so operations
    /// and cash re-reads observe one another.
    pub(crate) fn with_cash_cell(mut self, cell: WalletCell) -> Self {
        self.cash = cell;
        self
    }

    /// Makes `total_idle` block for `delay`, simulating a slow chain
    /// call at the head of a cycle.
    pub(crate) fn with_idle_query_delay(mut self, delay: Duration) -> Self {
        self.idle_query_delay = Some(delay);
        self
    }

    pub(crate) fn failing_total_debt(self) -> Self {
        self.fail_total_debt.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_total_idle(self) -> Self {
        self.fail_total_idle.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_agent_withdraw(self) -> Self {
        self.fail_agent_withdraw.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_update_debt(self) -> Self {
        self.fail_update_debt.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_agent_cash(self) -> Self {
        self.fail_agent_cash.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn idle_query_count(&self) -> usize {
        self.idle_queries.load(Ordering::SeqCst)
    }

    pub(crate) fn agent_withdrawals(&self) -> Vec<f64> {
        self.agent_withdrawals.lock().unwrap().clone()
    }

    pub(crate) fn debt_updates(&self) -> Vec<(f64, f64)> {
        self.debt_updates.lock().unwrap().clone()
    }

    fn unavailable(&self, what: &str) -> VaultError {
        VaultError::Unavailable {
            reason: format!("mock {what} failure"),
        }
    }
}

#[async_trait]
impl VaultLedger for MockVault {
    async fn total_debt(&self) -> Result<f64, VaultError> {
        if self.fail_total_debt.load(Ordering::SeqCst) {
            return Err(self.unavailable("totalDebt"));
        }
        Ok(*self.total_debt.lock().unwrap())
    }

    async fn total_idle(&self) -> Result<f64, VaultError> {
        self.idle_queries.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.idle_query_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_total_idle.load(Ordering::SeqCst) {
            return Err(self.unavailable("totalIdle"));
        }
        Ok(*self.total_idle.lock().unwrap())
    }

    async fn agent_withdraw(&self, amount: f64) -> Result<(), VaultError> {
        self.agent_withdrawals.lock().unwrap().push(amount);

        if self.fail_agent_withdraw.load(Ordering::SeqCst) {
            return Err(self.unavailable("agentWithdraw"));
        }

        *self.total_idle.lock().unwrap() -= amount;
        *self.cash.lock().unwrap() += amount;
        Ok(())
    }

    async fn update_debt(&self, profit: f64, loss: f64) -> Result<(), VaultError> {
        if self.fail_update_debt.load(Ordering::SeqCst) {
            return Err(self.unavailable("updateDebt"));
        }

        self.debt_updates.lock().unwrap().push((profit, loss));
        Ok(())
    }

    async fn agent_cash(&self) -> Result<f64, VaultError> {
        if self.fail_agent_cash.load(Ordering::SeqCst) {
            return Err(self.unavailable("agent cash"));
        }
        Ok(*self.cash.lock().unwrap())
    }
}
