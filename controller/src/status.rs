//! User-facing deposit/withdrawal status derived from runtime flags.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

use crate::types::{RuntimeState, TxFlags};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxKind {
    Deposit,
    Withdrawal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxPhase {
    Pending,
    Success,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxStatus {
    pub kind: TxKind,
    pub phase: TxPhase,
    pub transaction_hash: Option<String>,
    /// Tells the UI a new status replaced the previous one.
    pub reset: bool,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TxKind::Deposit => "DEPOSIT",
            TxKind::Withdrawal => "WITHDRAWAL",
        };
        let phase = match self.phase {
            TxPhase::Pending => "PENDING",
            TxPhase::Success => "SUCCESS",
        };
        write!(f, "{kind}_{phase}")
    }
}

fn phase_of(flags: &TxFlags) -> Option<TxPhase> {
    match (flags.submitted, flags.detected) {
        (false, _) => None,
        (true, false) => Some(TxPhase::Pending),
        (true, true) => Some(TxPhase::Success),
    }
}

/// Status implied by a runtime state, before de-duplication.
///
/// Withdrawal is checked after deposit and wins when both are active.
pub fn derive_status(runtime: &RuntimeState) -> Option<TxStatus> {
    let mut out = None;

    for (kind, flags) in [
        (TxKind::Deposit, &runtime.deposit),
        (TxKind::Withdrawal, &runtime.withdrawal),
    ] {
        if let Some(phase) = phase_of(flags) {
            let transaction_hash = match phase {
                TxPhase::Success => flags.transaction_hash.clone(),
                TxPhase::Pending => None,
            };
            out = Some(TxStatus {
                kind,
                phase,
                transaction_hash,
                reset: true,
            });
        }
    }

    out
}

/// Publishes a new [`TxStatus`] only when `{kind, phase}` changes.
///
/// There is no transition back to "nothing": a runtime with no submitted
/// operation leaves the last published status in place.
pub struct TxStatusTracker {
    tx: watch::Sender<Option<TxStatus>>,
}

impl Default for TxStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TxStatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TxStatus>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<TxStatus> {
        self.tx.borrow().clone()
    }

    /// Returns the status published by this call, if any.
    pub fn observe(&self, runtime: &RuntimeState) -> Option<TxStatus> {
        let next = derive_status(runtime)?;

        let mut published = None;
        self.tx.send_if_modified(|current| {
            let changed = current
                .as_ref()
                .is_none_or(|c| c.kind != next.kind || c.phase != next.phase);
            if changed {
                *current = Some(next.clone());
                published = Some(next.clone());
            }
            changed
        });

        if let Some(status) = &published {
            info!(
                status = %status,
                tx = status.transaction_hash.as_deref().unwrap_or(""),
                "new channel status"
            );
        }
        published
    }
}
