//! The two periodic decision loops: wallet → channel deposits, and
//! channel wei → token exchanges.

pub mod deposit;
pub mod swap;

use std::fmt;
use std::time::Duration;

use crate::types::RuntimeState;

pub use deposit::{
    DepositDecision, DepositInputs, DepositReconciler, SkipReason, evaluate_deposit,
};
pub use swap::{SwapReconciler, evaluate_swap};

/// Channel operation that holds the global in-flight lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InFlightKind {
    Deposit,
    Withdrawal,
    Collateral,
}

impl fmt::Display for InFlightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InFlightKind::Deposit => f.write_str("deposit"),
            InFlightKind::Withdrawal => f.write_str("withdrawal"),
            InFlightKind::Collateral => f.write_str("collateral"),
        }
    }
}

/// First operation submitted without a transaction hash, if any.
pub fn in_flight(runtime: &RuntimeState) -> Option<InFlightKind> {
    [
        (InFlightKind::Deposit, &runtime.deposit),
        (InFlightKind::Withdrawal, &runtime.withdrawal),
        (InFlightKind::Collateral, &runtime.collateral),
    ]
    .into_iter()
    .find(|(_, flags)| flags.is_in_flight())
    .map(|(kind, _)| kind)
}

#[derive(Clone, Copy, Debug)]
pub struct ReconcilerSettings {
    /// Upper bound for every call to the channel client, chain or oracle.
    pub call_timeout: Duration,
    /// How long an operation may stay submitted-without-hash before it is
    /// reported as stuck.
    pub stale_in_flight_after: Duration,
}
