//! Snapshots published by the channel client.
//!
//! The controller never mutates these; each state-change event replaces
//! the previous snapshot wholesale.

use alloy::primitives::U256;
use rust_decimal::Decimal;

/// Off-chain channel balances for the local user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Base-currency units held in the channel.
    pub balance_wei_user: U256,
    /// Token units held in the channel.
    pub balance_token_user: U256,
}

/// Submission/confirmation flags for one kind of on-chain operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxFlags {
    pub submitted: bool,
    pub detected: bool,
    pub transaction_hash: Option<String>,
}

impl TxFlags {
    /// Submitted but the confirming transaction hash has not arrived yet.
    pub fn is_in_flight(&self) -> bool {
        self.submitted && self.transaction_hash.is_none()
    }
}

/// Exchange rates quoted by the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeRates {
    /// USD per whole ETH. The channel token is USD-pegged.
    pub usd_per_eth: Decimal,
}

/// Transient operational status of the channel client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeState {
    pub deposit: TxFlags,
    pub withdrawal: TxFlags,
    pub collateral: TxFlags,
    pub can_exchange: bool,
    pub exchange_rate: Option<ExchangeRates>,
    pub sync_results_from_hub: Vec<String>,
}

/// One immutable state-change event from the channel client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub channel: Option<ChannelState>,
    pub runtime: RuntimeState,
}
