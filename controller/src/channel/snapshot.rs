use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::status::TxStatusTracker;
use crate::types::StateSnapshot;

/// Latest state published by the channel client.
///
/// Last write wins. Reconcilers clone the `Arc` at cycle start and work on
/// that immutable view for the rest of the cycle.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Option<Arc<StateSnapshot>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, snapshot: StateSnapshot) {
        *self.inner.write() = Some(Arc::new(snapshot));
    }

    pub fn latest(&self) -> Option<Arc<StateSnapshot>> {
        self.inner.read().clone()
    }
}

/// Consumes state-change events: stores each snapshot, then lets the status
/// tracker see the new runtime state. Ends when the client drops its sender.
pub fn spawn_snapshot_feed(
    mut rx: mpsc::Receiver<StateSnapshot>,
    store: SnapshotStore,
    tracker: Arc<TxStatusTracker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            debug!(
                has_channel = snapshot.channel.is_some(),
                can_exchange = snapshot.runtime.can_exchange,
                "channel state changed"
            );
            let runtime = snapshot.runtime.clone();
            store.set(snapshot);
            tracker.observe(&runtime);
        }
        info!("channel state stream closed");
    })
}
