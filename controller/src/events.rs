//! User-visible warnings raised by the reconcilers.

use std::fmt;

use alloy::primitives::U256;
use tokio::sync::broadcast;

use crate::reconciler::InFlightKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyWarning {
    /// Channel token balance is already at the maximum; deposit refused.
    NearChannelMax { balance_token: U256 },
    /// Deposit would exceed the channel ceiling; the whole deposit is withheld.
    ExceedsCeiling { excess_wei: U256 },
    /// An operation has been submitted without a hash for too long.
    StaleInFlight { kind: InFlightKind, since_ms: u64 },
    /// A recorded refund ceiling was never reached and has been dropped.
    StaleRefundGuard { expected_max: U256 },
    /// Token balance could not be read; the cycle assumed zero.
    TokenBalanceUnavailable { reason: String },
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyWarning::NearChannelMax { .. } => {
                f.write_str("You already have maximum balance. Refusing to deposit more for now.")
            }
            PolicyWarning::ExceedsCeiling { .. } => f.write_str(
                "You've deposited more balance than the maximum. Only balance up to the maximum \
                 will be deposited - retrieve remaining funds by recovering your seed phrase into a wallet",
            ),
            PolicyWarning::StaleInFlight { kind, .. } => {
                write!(f, "{kind} transaction has not been confirmed for a long time")
            }
            PolicyWarning::StaleRefundGuard { .. } => {
                f.write_str("A pending refund never landed; automatic deposits resumed")
            }
            PolicyWarning::TokenBalanceUnavailable { reason } => {
                write!(f, "Could not read token balance: {reason}")
            }
        }
    }
}

/// Fan-out of warnings to any number of UI listeners.
#[derive(Clone)]
pub struct WarningBus {
    tx: broadcast::Sender<PolicyWarning>,
}

impl WarningBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PolicyWarning> {
        self.tx.subscribe()
    }

    /// Having no listeners is fine; the warning is logged by the caller.
    pub fn emit(&self, warning: PolicyWarning) {
        let _ = self.tx.send(warning);
    }
}
