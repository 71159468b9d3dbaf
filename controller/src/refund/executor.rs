//! Returns excess wallet balance to whoever funded the wallet.
//!
//! Not wired into the deposit reconciler: the reconciler only withholds and
//! warns. Embedders may call [`RefundExecutor::refund_excess`] explicitly.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::Context;
use tracing::{error, info, instrument, warn};

use crate::chain::ChainClient;
use crate::constants::REFUND_LOOKBACK_BLOCKS;
use crate::error::ControllerError;
use crate::guard::ReconciliationState;
use crate::time::bounded;

pub use crate::chain::TransactionReceipt;

pub struct RefundExecutor {
    chain: Arc<dyn ChainClient>,
    guard: Arc<ReconciliationState>,
    wallet: Address,
    call_timeout: Duration,
}

impl RefundExecutor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        guard: Arc<ReconciliationState>,
        wallet: Address,
        call_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            guard,
            wallet,
            call_timeout,
        }
    }

    /// Sends `amount_wei` back to the most recent sender.
    ///
    /// While the transfer is in progress `refunding` blocks deposits. On
    /// success the post-refund balance ceiling is recorded so the deposit
    /// reconciler waits for the transfer to land. Returns `None` for a zero
    /// amount.
    #[instrument(skip(self), fields(wallet = %self.wallet))]
    pub async fn refund_excess(
        &self,
        amount_wei: U256,
        now_ms: u64,
    ) -> anyhow::Result<Option<TransactionReceipt>> {
        if amount_wei.is_zero() {
            return Ok(None);
        }

        self.guard.begin_refund(amount_wei).await?;

        match self.send_refund(amount_wei, now_ms).await {
            Ok(receipt) => {
                self.guard.finish_refund(false).await?;
                info!(
                    tx = %receipt.transaction_hash,
                    amount = %amount_wei,
                    "refund transaction mined"
                );
                Ok(Some(receipt))
            }
            Err(e) => {
                error!(error = ?e, amount = %amount_wei, "refund failed");
                if let Err(clear) = self.guard.finish_refund(true).await {
                    warn!(error = ?clear, "could not clear refund guard after failure");
                }
                Err(e)
            }
        }
    }

    async fn send_refund(&self, amount_wei: U256, now_ms: u64) -> anyhow::Result<TransactionReceipt> {
        let sender = bounded(
            "latest_sender_to",
            self.call_timeout,
            self.chain.latest_sender_to(self.wallet, REFUND_LOOKBACK_BLOCKS),
        )
        .await??
        .ok_or_else(|| ControllerError::RefundSenderNotFound(self.wallet.to_string()))?;

        let balance_before = bounded(
            "get_balance",
            self.call_timeout,
            self.chain.get_balance(self.wallet),
        )
        .await??;
        let max_after = balance_before.saturating_sub(amount_wei);

        info!(to = %sender, amount = %amount_wei, "sending refund");

        let receipt = self
            .chain
            .send_value(sender, amount_wei)
            .await
            .with_context(|| format!("refund {amount_wei} wei to {sender}"))?;

        // Gas makes the real balance strictly lower than this once mined.
        self.guard.record_refund_sent(max_after, now_ms).await?;

        Ok(receipt)
    }
}
