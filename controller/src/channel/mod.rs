//! Narrow interface to the payment-channel client.
//!
//! The channel state machine itself lives behind [`ChannelClient`]; the
//! controller only starts it, listens to its state changes and asks it to
//! deposit or exchange.

pub mod snapshot;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{ChannelDepositRequest, CurrencyKind, StateSnapshot};

pub use snapshot::{SnapshotStore, spawn_snapshot_feed};

/// What the channel client needs to connect to a hub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOptions {
    pub hub_url: String,
    pub mnemonic: String,
}

#[async_trait]
pub trait ChannelClient: Send + Sync + 'static {
    /// Begins the client's own polling of the hub.
    async fn start(&self) -> anyhow::Result<()>;

    /// Stream of state changes. Only one subscriber is supported.
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<StateSnapshot>>;

    async fn deposit(&self, request: ChannelDepositRequest) -> anyhow::Result<()>;

    async fn exchange(&self, amount: U256, currency: CurrencyKind) -> anyhow::Result<()>;

    fn wallet_address(&self) -> Address;

    /// ERC-20 contract of the channel token on the connected chain.
    fn token_address(&self) -> Address;

    /// Ethereum JSON-RPC endpoint the client itself uses.
    fn rpc_url(&self) -> String;
}

/// Constructs a channel client for a hub. Supplied by the embedding app.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, options: ChannelOptions) -> anyhow::Result<Arc<dyn ChannelClient>>;
}
