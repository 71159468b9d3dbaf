//! Converts channel wei into tokens while the hub still accepts exchanges.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::ReconcilerSettings;
use crate::channel::{ChannelClient, SnapshotStore};
use crate::constants::hub_exchange_ceiling;
use crate::metrics::counters::Counters;
use crate::time::bounded;
use crate::types::{ChannelState, CurrencyKind, ExchangeRequest, RuntimeState};

/// Exchange request for this cycle, if any.
///
/// The whole channel wei balance is exchanged while the token balance is
/// still below the hub exchange ceiling.
pub fn evaluate_swap(
    channel: Option<&ChannelState>,
    runtime: Option<&RuntimeState>,
) -> Option<ExchangeRequest> {
    let runtime = runtime?;
    if !runtime.can_exchange {
        return None;
    }

    let channel = channel?;
    if channel.balance_wei_user.is_zero() || channel.balance_token_user >= hub_exchange_ceiling() {
        return None;
    }

    Some(ExchangeRequest {
        amount: channel.balance_wei_user,
        currency: CurrencyKind::Wei,
    })
}

pub struct SwapReconciler {
    channel: Arc<dyn ChannelClient>,
    snapshots: SnapshotStore,
    counters: Counters,
    settings: ReconcilerSettings,
}

impl SwapReconciler {
    pub fn new(
        channel: Arc<dyn ChannelClient>,
        snapshots: SnapshotStore,
        counters: Counters,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            channel,
            snapshots,
            counters,
            settings,
        }
    }

    /// Requests at most one exchange. Completion shows up later in the
    /// channel state stream.
    #[instrument(skip(self), target = "reconciler", name = "swap_cycle")]
    pub async fn run_cycle(&self) -> anyhow::Result<Option<ExchangeRequest>> {
        Counters::bump(&self.counters.swap_cycles);

        let snapshot = self.snapshots.latest();
        let request = evaluate_swap(
            snapshot.as_ref().and_then(|s| s.channel.as_ref()),
            snapshot.as_ref().map(|s| &s.runtime),
        );

        let Some(request) = request else {
            debug!("no exchange this cycle");
            return Ok(None);
        };

        info!(amount = %request.amount, currency = %request.currency, "requesting exchange");
        bounded(
            "channel_exchange",
            self.settings.call_timeout,
            self.channel.exchange(request.amount, request.currency),
        )
        .await??;
        Counters::bump(&self.counters.swaps_requested);

        Ok(Some(request))
    }
}
