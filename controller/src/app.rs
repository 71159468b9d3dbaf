//! Startup wiring and the read-only surface handed to UI code.

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Context;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chain::{AlloyChainConnector, ChainConnector};
use crate::channel::{ChannelConnector, ChannelOptions, SnapshotStore, spawn_snapshot_feed};
use crate::config::{AppConfig, Network};
use crate::db::Db;
use crate::error::ControllerError;
use crate::events::{PolicyWarning, WarningBus};
use crate::gas::{EthGasStationClient, GasOracle};
use crate::guard::{KvRepository, ReconciliationState, SqlxKvRepository};
use crate::metrics::counters::Counters;
use crate::minimum_balance::{BrowserMinimumBalance, MinimumBalanceCache, MinimumBalanceCalculator};
use crate::reconciler::{DepositReconciler, ReconcilerSettings, SwapReconciler};
use crate::refund::RefundExecutor;
use crate::scheduler::{PollingScheduler, SchedulerHandle};
use crate::status::{TxStatus, TxStatusTracker};
use crate::time::{bounded, now_ms};
use crate::types::{ChannelState, RuntimeState};

/// Everything the controller reaches out to.
pub struct Collaborators {
    pub channel: Arc<dyn ChannelConnector>,
    pub chain: Arc<dyn ChainConnector>,
    pub gas_oracle: Arc<dyn GasOracle>,
    pub repository: Arc<dyn KvRepository>,
}

impl Collaborators {
    /// Production wiring: ETH Gas Station oracle, alloy over HTTP and the
    /// SQLite key/value store. Only the channel connector is app-specific.
    pub async fn from_config(
        cfg: &AppConfig,
        channel: Arc<dyn ChannelConnector>,
    ) -> anyhow::Result<Self> {
        let gas_oracle = EthGasStationClient::new(cfg.gas_oracle_url.clone())
            .context("building gas oracle client")?;
        let repository = open_repository(cfg).await?;

        Ok(Self {
            channel,
            chain: Arc::new(AlloyChainConnector),
            gas_oracle: Arc::new(gas_oracle),
            repository,
        })
    }
}

/// Installs the process-wide subscriber; JSON output in production.
/// A subscriber installed earlier by the embedding app is left alone.
pub fn init_logging(cfg: &AppConfig) {
    common::logger::init_logger("channel-controller", cfg.json_logs);
}

/// Opens the wallet database and prepares the key/value table.
pub async fn open_repository(cfg: &AppConfig) -> anyhow::Result<Arc<SqlxKvRepository>> {
    let db = Db::connect(&cfg.database_url)
        .await
        .with_context(|| format!("connecting to {}", cfg.database_url))?;
    db.migrate().await?;
    Ok(Arc::new(SqlxKvRepository::new(db.pool)))
}

/// Result of selecting a different network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkSwitch {
    /// Persisted; the embedding app must restart the controller to use it.
    ReloadRequired { network: Network },
}

/// Cheap, cloneable read access to the controller's derived state.
#[derive(Clone)]
pub struct ControllerHandle {
    snapshots: SnapshotStore,
    minimum: Arc<MinimumBalanceCache>,
    tracker: Arc<TxStatusTracker>,
    warnings: WarningBus,
    guard: Arc<ReconciliationState>,
    counters: Counters,
    network: Network,
    wallet: Address,
}

impl ControllerHandle {
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.snapshots.latest().and_then(|s| s.channel.clone())
    }

    pub fn runtime_state(&self) -> Option<RuntimeState> {
        self.snapshots.latest().map(|s| s.runtime.clone())
    }

    pub fn browser_minimum_balance(&self) -> Option<BrowserMinimumBalance> {
        self.minimum.get()
    }

    pub fn tx_status(&self) -> watch::Receiver<Option<TxStatus>> {
        self.tracker.subscribe()
    }

    pub fn subscribe_warnings(&self) -> broadcast::Receiver<PolicyWarning> {
        self.warnings.subscribe()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Persists `network` and drops refund guards tied to the old chain.
    pub async fn network_handler(&self, network: Network) -> anyhow::Result<NetworkSwitch> {
        self.guard.switch_network(network.as_str()).await?;
        info!(from = %self.network, to = %network, "network changed; reload required");
        Ok(NetworkSwitch::ReloadRequired { network })
    }
}

pub struct Controller {
    handle: ControllerHandle,
    refund: Arc<RefundExecutor>,
    scheduler: SchedulerHandle,
    feed: JoinHandle<()>,
}

impl Controller {
    /// Brings the controller up in the same order the wallet always has:
    /// restore persisted state, connect the channel client, start it and
    /// wait for its first state, compute the minimum balance, then start
    /// polling.
    pub async fn bootstrap(cfg: &AppConfig, deps: Collaborators) -> anyhow::Result<Self> {
        init_logging(cfg);

        let guard = Arc::new(ReconciliationState::new(
            deps.repository,
            cfg.stale_in_flight_after,
        ));

        guard.clear_refunding_on_startup().await?;

        let network = resolve_network(cfg, &guard).await?;
        let mnemonic = guard
            .mnemonic()
            .await?
            .filter(|m| !m.trim().is_empty())
            .ok_or(ControllerError::MissingMnemonic)?;

        let hub_url = cfg.hub_url(network);
        info!(network = %network, hub_url = %hub_url, "connecting channel client");

        let channel = deps
            .channel
            .connect(ChannelOptions {
                hub_url,
                mnemonic: mnemonic.clone(),
            })
            .await
            .map_err(|e| ControllerError::ChannelInit(format!("{e:#}")))?;

        let wallet = channel.wallet_address();
        info!(
            wallet = %wallet,
            token = %channel.token_address(),
            "channel client connected"
        );

        let rpc_url = cfg
            .eth_override(network)
            .map(str::to_string)
            .unwrap_or_else(|| channel.rpc_url());
        let chain = deps.chain.connect(&rpc_url, &mnemonic).await?;

        let snapshots = SnapshotStore::new();
        let tracker = Arc::new(TxStatusTracker::new());

        let mut events = channel
            .subscribe()
            .await
            .map_err(|e| ControllerError::ChannelInit(format!("{e:#}")))?;

        channel
            .start()
            .await
            .map_err(|e| ControllerError::ChannelInit(format!("{e:#}")))?;

        // The minimum balance and the initial pass need the first state.
        match bounded("first_snapshot", cfg.external_call_timeout, events.recv()).await {
            Ok(Some(first)) => {
                let runtime = first.runtime.clone();
                snapshots.set(first);
                tracker.observe(&runtime);
            }
            Ok(None) => {
                return Err(ControllerError::ChannelInit(
                    "state stream closed before the first snapshot".to_string(),
                )
                .into());
            }
            Err(e) => warn!(error = %e, "no channel state yet; reconcilers wait for the feed"),
        }
        let feed = spawn_snapshot_feed(events, snapshots.clone(), tracker.clone());

        let minimum = Arc::new(MinimumBalanceCache::new(
            MinimumBalanceCalculator::new(deps.gas_oracle),
            cfg.min_balance_refresh,
        ));
        let runtime = snapshots.latest().map(|s| s.runtime.clone());
        if let Err(e) = minimum.refresh(runtime.as_ref(), now_ms()).await {
            warn!(error = %e, "initial minimum balance unavailable; deposits wait for it");
        }

        let settings = ReconcilerSettings {
            call_timeout: cfg.external_call_timeout,
            stale_in_flight_after: cfg.stale_in_flight_after,
        };
        let warnings = WarningBus::new(cfg.warning_capacity);
        let counters = Counters::default();

        let deposit = Arc::new(DepositReconciler::new(
            channel.clone(),
            chain.clone(),
            snapshots.clone(),
            minimum.clone(),
            guard.clone(),
            warnings.clone(),
            counters.clone(),
            settings,
        ));
        let swap = Arc::new(SwapReconciler::new(
            channel,
            snapshots.clone(),
            counters.clone(),
            settings,
        ));

        let refund = Arc::new(RefundExecutor::new(
            chain,
            guard.clone(),
            wallet,
            cfg.external_call_timeout,
        ));

        let scheduler = PollingScheduler::new(
            deposit,
            swap,
            cfg.deposit_interval,
            cfg.swap_interval,
            counters.clone(),
        )
        .start()
        .await;

        Ok(Self {
            handle: ControllerHandle {
                snapshots,
                minimum,
                tracker,
                warnings,
                guard,
                counters,
                network,
                wallet,
            },
            refund,
            scheduler,
            feed,
        })
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Manual refund path; the reconcilers never trigger it.
    pub fn refund_executor(&self) -> Arc<RefundExecutor> {
        self.refund.clone()
    }

    pub fn shutdown(self) {
        self.scheduler.shutdown();
        self.feed.abort();
    }
}

async fn resolve_network(cfg: &AppConfig, guard: &ReconciliationState) -> anyhow::Result<Network> {
    match guard.selected_network().await? {
        Some(stored) => Ok(stored.parse::<Network>()?),
        None => {
            let network = cfg.default_network();
            guard.set_network(network.as_str()).await?;
            Ok(network)
        }
    }
}
