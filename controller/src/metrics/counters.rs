use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub deposit_cycles: Arc<AtomicU64>,
    pub deposits_submitted: Arc<AtomicU64>,
    pub deposit_skips: Arc<AtomicU64>,

    pub swap_cycles: Arc<AtomicU64>,
    pub swaps_requested: Arc<AtomicU64>,

    // withheld / warned
    pub deposits_withheld: Arc<AtomicU64>,
    pub stale_in_flight: Arc<AtomicU64>,
    pub stale_refund_guards: Arc<AtomicU64>,

    pub cycle_errors: Arc<AtomicU64>,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
