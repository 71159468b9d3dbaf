//! On-chain reads and the plain value transfer used for refunds.

pub mod alloy_client;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

pub use alloy_client::{AlloyChainClient, AlloyChainConnector};

/// Outcome of a mined value transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Native balance of `address` in wei.
    async fn get_balance(&self, address: Address) -> anyhow::Result<U256>;

    /// ERC-20 `balanceOf(address)` on `token`.
    async fn get_token_balance(&self, token: Address, address: Address) -> anyhow::Result<U256>;

    /// Sender of the highest-nonce transaction to `address` within the last
    /// `lookback_blocks` blocks.
    async fn latest_sender_to(
        &self,
        address: Address,
        lookback_blocks: u64,
    ) -> anyhow::Result<Option<Address>>;

    /// Sends `amount` wei from the wallet to `to` and waits for the receipt.
    async fn send_value(&self, to: Address, amount: U256) -> anyhow::Result<TransactionReceipt>;
}

/// Builds a chain client once the RPC endpoint and wallet are known.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(&self, rpc_url: &str, mnemonic: &str) -> anyhow::Result<Arc<dyn ChainClient>>;
}
