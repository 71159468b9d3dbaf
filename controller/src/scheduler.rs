//! Drives the reconcilers: one initial pass, then two independent timers.
//!
//! A failing cycle is logged and counted; it never stops its timer. Each
//! timer awaits its own cycle before ticking again, so a path never overlaps
//! itself, while deposit and swap may interleave freely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::logger::{TraceId, cycle_span};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, error, info};

use crate::metrics::counters::Counters;
use crate::reconciler::{DepositDecision, DepositReconciler, SwapReconciler};
use crate::time::now_ms;

/// One periodic reconciliation path.
#[async_trait]
pub trait ReconcileCycle: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Runs one pass and returns a short outcome label for the cycle span.
    async fn run(&self, now_ms: u64) -> anyhow::Result<&'static str>;
}

#[async_trait]
impl ReconcileCycle for DepositReconciler {
    fn name(&self) -> &'static str {
        "deposit"
    }

    async fn run(&self, now_ms: u64) -> anyhow::Result<&'static str> {
        Ok(match self.run_cycle(now_ms).await? {
            DepositDecision::Submit(_) => "submitted",
            DepositDecision::Skip(reason) => reason.label(),
        })
    }
}

#[async_trait]
impl ReconcileCycle for SwapReconciler {
    fn name(&self) -> &'static str {
        "swap"
    }

    async fn run(&self, _now_ms: u64) -> anyhow::Result<&'static str> {
        Ok(match self.run_cycle().await? {
            Some(_) => "requested",
            None => "idle",
        })
    }
}

/// Running timers. Dropping the handle leaves them running.
pub struct SchedulerHandle {
    deposit: JoinHandle<()>,
    swap: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops both timers.
    pub fn shutdown(self) {
        self.deposit.abort();
        self.swap.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.deposit.is_finished() && !self.swap.is_finished()
    }
}

pub struct PollingScheduler {
    deposit: Arc<dyn ReconcileCycle>,
    swap: Arc<dyn ReconcileCycle>,
    deposit_every: Duration,
    swap_every: Duration,
    counters: Counters,
}

impl PollingScheduler {
    pub fn new(
        deposit: Arc<dyn ReconcileCycle>,
        swap: Arc<dyn ReconcileCycle>,
        deposit_every: Duration,
        swap_every: Duration,
        counters: Counters,
    ) -> Self {
        Self {
            deposit,
            swap,
            deposit_every,
            swap_every,
            counters,
        }
    }

    /// Runs deposit then swap once, awaited in order, then starts the timers.
    pub async fn start(self) -> SchedulerHandle {
        run_once(self.deposit.as_ref(), &self.counters).await;
        run_once(self.swap.as_ref(), &self.counters).await;

        info!(
            deposit_every_ms = self.deposit_every.as_millis() as u64,
            swap_every_ms = self.swap_every.as_millis() as u64,
            "polling scheduler started"
        );

        SchedulerHandle {
            deposit: spawn_timer(self.deposit, self.deposit_every, self.counters.clone()),
            swap: spawn_timer(self.swap, self.swap_every, self.counters),
        }
    }
}

fn spawn_timer(cycle: Arc<dyn ReconcileCycle>, every: Duration, counters: Counters) -> JoinHandle<()> {
    tokio::spawn(async move {
        // the initial pass already covered t=0
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            run_once(cycle.as_ref(), &counters).await;
        }
    })
}

async fn run_once(cycle: &dyn ReconcileCycle, counters: &Counters) {
    let span = cycle_span(cycle.name(), &TraceId::default());

    match cycle.run(now_ms()).instrument(span.clone()).await {
        Ok(outcome) => {
            span.record("outcome", outcome);
        }
        Err(e) => {
            span.record("outcome", "error");
            Counters::bump(&counters.cycle_errors);
            error!(parent: &span, error = ?e, cycle = cycle.name(), "reconciliation cycle failed");
        }
    }
}
