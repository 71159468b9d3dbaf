use std::sync::Arc;

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::{EthereumWallet, TransactionBuilder, TransactionResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::{MnemonicBuilder, coins_bip39::English};
use alloy::sol;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::{ChainClient, ChainConnector, TransactionReceipt};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }
}

/// JSON-RPC chain client signing with the wallet's first derived key.
pub struct AlloyChainClient {
    provider: DynProvider,
    wallet_address: Address,
}

impl AlloyChainClient {
    pub fn connect(rpc_url: &str, mnemonic: &str) -> anyhow::Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(mnemonic)
            .index(0)
            .context("derive wallet key index")?
            .build()
            .context("build wallet signer from mnemonic")?;
        let wallet_address = signer.address();

        let url = rpc_url
            .parse()
            .with_context(|| format!("invalid ethereum rpc url: {rpc_url}"))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!(rpc_url = %rpc_url, wallet = %wallet_address, "chain client connected");

        Ok(Self {
            provider,
            wallet_address,
        })
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet_address
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    #[instrument(skip(self), level = "debug")]
    async fn get_balance(&self, address: Address) -> anyhow::Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .with_context(|| format!("eth_getBalance({address})"))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_token_balance(&self, token: Address, address: Address) -> anyhow::Result<U256> {
        IERC20::new(token, &self.provider)
            .balanceOf(address)
            .call()
            .await
            .with_context(|| format!("balanceOf({address}) on token {token}"))
    }

    #[instrument(skip(self), level = "debug")]
    async fn latest_sender_to(
        &self,
        address: Address,
        lookback_blocks: u64,
    ) -> anyhow::Result<Option<Address>> {
        let head = self
            .provider
            .get_block_number()
            .await
            .context("eth_blockNumber")?;
        let start = head.saturating_sub(lookback_blocks);

        let mut best: Option<(u64, Address)> = None;

        for number in start..=head {
            let Some(block) = self
                .provider
                .get_block_by_number(BlockNumberOrTag::Number(number))
                .full()
                .await
                .with_context(|| format!("eth_getBlockByNumber({number})"))?
            else {
                continue;
            };

            for tx in block.transactions.txns() {
                if tx.to() != Some(address) {
                    continue;
                }
                let nonce = tx.nonce();
                if best.is_none_or(|(n, _)| nonce >= n) {
                    best = Some((nonce, tx.from()));
                }
            }
        }

        debug!(start, head, found = best.is_some(), "scanned blocks for latest sender");
        Ok(best.map(|(_, from)| from))
    }

    #[instrument(skip(self), level = "debug")]
    async fn send_value(&self, to: Address, amount: U256) -> anyhow::Result<TransactionReceipt> {
        let request = TransactionRequest::default()
            .with_from(self.wallet_address)
            .with_to(to)
            .with_value(amount);

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .context("send refund transaction")?;

        let receipt = pending
            .get_receipt()
            .await
            .context("await refund transaction receipt")?;

        Ok(TransactionReceipt {
            transaction_hash: receipt.transaction_hash.to_string(),
            block_number: receipt.block_number,
            success: receipt.status(),
        })
    }
}

/// Connects [`AlloyChainClient`]s over HTTP.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlloyChainConnector;

#[async_trait]
impl ChainConnector for AlloyChainConnector {
    async fn connect(&self, rpc_url: &str, mnemonic: &str) -> anyhow::Result<Arc<dyn ChainClient>> {
        Ok(Arc::new(AlloyChainClient::connect(rpc_url, mnemonic)?))
    }
}
