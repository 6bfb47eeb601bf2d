//! Fixed-interval cycle scheduler with skip-if-busy semantics.
//!
//! One mutual-exclusion lock guards the whole process: a tick that
//! finds a prior cycle still running is dropped outright, never queued,
//! so at most one cycle is in flight and the number of outstanding
//! on-chain operations from the agent wallet stays bounded. The lock is
//! released unconditionally when `run_cycle` returns, success or caught
//! failure alike.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::orchestrator::RebalanceOrchestrator;
use crate::vault::VaultLedger;

pub struct Scheduler<V> {
    orchestrator: Arc<RebalanceOrchestrator<V>>,
    lock: Arc<Mutex<()>>,
}

impl<V> Scheduler<V>
where
    V: VaultLedger,
{
    pub fn new(orchestrator: Arc<RebalanceOrchestrator<V>>) -> Self {
        Self {
            orchestrator,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fires cycles on a fixed interval until dropped. The first cycle
    /// runs immediately.
    pub async fn run(&self, interval: Duration) {
        info!(?interval, "scheduler started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Attempts one cycle. Returns `false` when a prior cycle still
    /// holds the lock and this tick was dropped.
    pub async fn tick(&self) -> bool {
        let Ok(_guard) = self.lock.try_lock() else {
            debug!("previous rebalance cycle still running, dropping tick");
            return false;
        };

        match self.orchestrator.run_cycle().await {
            Ok(outcome) => info!(?outcome, "rebalance cycle finished"),
            Err(error) => error!(%error, "rebalance cycle aborted"),
        }

        true
    }
}
