//! Persisted reconciliation state: guard flags and wallet preferences.
//!
//! Every read-modify-write of the guard flags goes through one mutex so the
//! deposit cycle and the refund path never observe a half-cleared pair.

pub mod memory;
pub mod repository;
pub mod repository_sqlx;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use memory::InMemoryKvRepository;
pub use repository::KvRepository;
pub use repository_sqlx::SqlxKvRepository;

pub const KEY_NETWORK: &str = "rpc-prod";
pub const KEY_MNEMONIC: &str = "mnemonic";
pub const KEY_REFUNDING: &str = "refunding";
pub const KEY_MAX_BALANCE_AFTER_REFUND: &str = "maxBalanceAfterRefund";
pub const KEY_MAX_BALANCE_RECORDED_AT: &str = "maxBalanceAfterRefundAt";

/// Outcome of checking the refund guards against the current wallet balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardCheck {
    /// No refund outstanding; deposits may proceed.
    Clear,
    /// A refund landed since the last cycle; both guards were removed.
    Cleared,
    /// A refund transaction is being submitted right now.
    Refunding,
    /// Balance has not dropped below the recorded post-refund maximum yet.
    RefundPending { expected_max: U256 },
    /// The recorded maximum outlived the staleness threshold and was dropped.
    StaleCleared { expected_max: U256 },
}

/// Controller-owned view over the persisted key/value store.
pub struct ReconciliationState {
    repo: Arc<dyn KvRepository>,
    stale_after: Duration,
    lock: Mutex<()>,
}

impl ReconciliationState {
    pub fn new(repo: Arc<dyn KvRepository>, stale_after: Duration) -> Self {
        Self {
            repo,
            stale_after,
            lock: Mutex::new(()),
        }
    }

    pub async fn is_refunding(&self) -> anyhow::Result<bool> {
        Ok(self.repo.get(KEY_REFUNDING).await?.is_some())
    }

    pub async fn max_balance_after_refund(&self) -> anyhow::Result<Option<U256>> {
        match self.repo.get(KEY_MAX_BALANCE_AFTER_REFUND).await? {
            Some(v) => {
                let parsed = U256::from_str(v.trim())
                    .with_context(|| format!("invalid {KEY_MAX_BALANCE_AFTER_REFUND}: {v}"))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// A refund cannot be mid-submission across a restart.
    pub async fn clear_refunding_on_startup(&self) -> anyhow::Result<()> {
        let _g = self.lock.lock().await;
        self.repo.remove(KEY_REFUNDING).await
    }

    /// Compares `wallet_balance` with the recorded post-refund maximum and
    /// clears the guards once the refund has landed.
    pub async fn settle(&self, wallet_balance: U256, now_ms: u64) -> anyhow::Result<GuardCheck> {
        let _g = self.lock.lock().await;

        if self.is_refunding().await? {
            return Ok(GuardCheck::Refunding);
        }

        let Some(expected_max) = self.max_balance_after_refund().await? else {
            return Ok(GuardCheck::Clear);
        };

        if self.recorded_too_long_ago(now_ms).await? {
            self.clear_refund_keys().await?;
            warn!(
                expected_max = %expected_max,
                balance = %wallet_balance,
                "refund guard exceeded staleness threshold; force-cleared"
            );
            return Ok(GuardCheck::StaleCleared { expected_max });
        }

        if wallet_balance >= expected_max {
            debug!(
                expected_max = %expected_max,
                balance = %wallet_balance,
                "refund not landed yet"
            );
            return Ok(GuardCheck::RefundPending { expected_max });
        }

        self.clear_refund_keys().await?;
        info!(balance = %wallet_balance, "refund landed; guard flags cleared");
        Ok(GuardCheck::Cleared)
    }

    /// Marks a refund as being submitted. Blocks deposits until finished.
    pub async fn begin_refund(&self, amount_wei: U256) -> anyhow::Result<()> {
        let _g = self.lock.lock().await;
        self.repo.set(KEY_REFUNDING, &amount_wei.to_string()).await
    }

    /// Records the balance the wallet must drop below once the refund mines.
    pub async fn record_refund_sent(&self, max_balance: U256, now_ms: u64) -> anyhow::Result<()> {
        let _g = self.lock.lock().await;
        self.repo
            .set(KEY_MAX_BALANCE_AFTER_REFUND, &max_balance.to_string())
            .await?;
        self.repo
            .set(KEY_MAX_BALANCE_RECORDED_AT, &now_ms.to_string())
            .await
    }

    /// Ends the submission phase. With `failed`, the recorded maximum is
    /// dropped too since no transaction will land.
    pub async fn finish_refund(&self, failed: bool) -> anyhow::Result<()> {
        let _g = self.lock.lock().await;
        if failed {
            self.repo.remove(KEY_MAX_BALANCE_AFTER_REFUND).await?;
            self.repo.remove(KEY_MAX_BALANCE_RECORDED_AT).await?;
        }
        self.repo.remove(KEY_REFUNDING).await
    }

    pub async fn selected_network(&self) -> anyhow::Result<Option<String>> {
        self.repo.get(KEY_NETWORK).await
    }

    pub async fn set_network(&self, network: &str) -> anyhow::Result<()> {
        self.repo.set(KEY_NETWORK, network).await
    }

    /// Persists a new network and drops every refund guard, which only
    /// makes sense for the previous chain.
    pub async fn switch_network(&self, network: &str) -> anyhow::Result<()> {
        let _g = self.lock.lock().await;
        self.repo.set(KEY_NETWORK, network).await?;
        self.clear_refund_keys().await?;
        self.repo.remove(KEY_REFUNDING).await
    }

    pub async fn mnemonic(&self) -> anyhow::Result<Option<String>> {
        self.repo.get(KEY_MNEMONIC).await
    }

    async fn recorded_too_long_ago(&self, now_ms: u64) -> anyhow::Result<bool> {
        let Some(raw) = self.repo.get(KEY_MAX_BALANCE_RECORDED_AT).await? else {
            // Written by an older client without a timestamp; rely on the
            // balance comparison alone.
            return Ok(false);
        };

        let recorded_ms: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {KEY_MAX_BALANCE_RECORDED_AT}: {raw}"))?;

        Ok(now_ms.saturating_sub(recorded_ms) >= self.stale_after.as_millis() as u64)
    }

    async fn clear_refund_keys(&self) -> anyhow::Result<()> {
        self.repo.remove(KEY_REFUNDING).await?;
        self.repo.remove(KEY_MAX_BALANCE_AFTER_REFUND).await?;
        self.repo.remove(KEY_MAX_BALANCE_RECORDED_AT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: Duration = Duration::from_secs(600);

    async fn state_with(entries: &[(&str, &str)]) -> (Arc<InMemoryKvRepository>, ReconciliationState) {
        let repo = Arc::new(InMemoryKvRepository::new());
        for (k, v) in entries {
            repo.set(k, v).await.unwrap();
        }
        let state = ReconciliationState::new(repo.clone(), STALE);
        (repo, state)
    }

    #[tokio::test]
    async fn no_guards_is_clear() {
        let (_, state) = state_with(&[]).await;
        let out = state.settle(U256::from(10u64), 0).await.unwrap();
        assert_eq!(out, GuardCheck::Clear);
    }

    #[tokio::test]
    async fn refunding_blocks_without_touching_keys() {
        let (repo, state) = state_with(&[(KEY_REFUNDING, "5")]).await;
        let out = state.settle(U256::from(10u64), 0).await.unwrap();
        assert_eq!(out, GuardCheck::Refunding);
        assert!(repo.snapshot().contains_key(KEY_REFUNDING));
    }

    #[tokio::test]
    async fn balance_at_or_above_max_keeps_guard() {
        let (repo, state) = state_with(&[(KEY_MAX_BALANCE_AFTER_REFUND, "50")]).await;

        let out = state.settle(U256::from(50u64), 0).await.unwrap();
        assert_eq!(
            out,
            GuardCheck::RefundPending {
                expected_max: U256::from(50u64)
            }
        );
        assert_eq!(repo.snapshot().get(KEY_MAX_BALANCE_AFTER_REFUND).unwrap(), "50");
    }

    #[tokio::test]
    async fn balance_below_max_clears_guard() {
        let (repo, state) = state_with(&[(KEY_MAX_BALANCE_AFTER_REFUND, "50")]).await;
        let out = state.settle(U256::from(40u64), 0).await.unwrap();
        assert_eq!(out, GuardCheck::Cleared);
        assert!(repo.snapshot().is_empty());
    }

    #[tokio::test]
    async fn stale_max_is_force_cleared() {
        let (repo, state) = state_with(&[
            (KEY_MAX_BALANCE_AFTER_REFUND, "50"),
            (KEY_MAX_BALANCE_RECORDED_AT, "1000"),
        ])
        .await;

        let now = 1000 + STALE.as_millis() as u64;
        let out = state.settle(U256::from(60u64), now).await.unwrap();
        assert_eq!(
            out,
            GuardCheck::StaleCleared {
                expected_max: U256::from(50u64)
            }
        );
        assert!(repo.snapshot().is_empty());
    }

    #[tokio::test]
    async fn garbage_max_is_an_error() {
        let (_, state) = state_with(&[(KEY_MAX_BALANCE_AFTER_REFUND, "not-a-number")]).await;
        assert!(state.settle(U256::from(1u64), 0).await.is_err());
    }

    #[tokio::test]
    async fn switch_network_drops_refund_guards() {
        let (repo, state) = state_with(&[
            (KEY_NETWORK, "MAINNET"),
            (KEY_REFUNDING, "1"),
            (KEY_MAX_BALANCE_AFTER_REFUND, "50"),
            (KEY_MNEMONIC, "seed words"),
        ])
        .await;

        state.switch_network("RINKEBY").await.unwrap();

        let kv = repo.snapshot();
        assert_eq!(kv.get(KEY_NETWORK).unwrap(), "RINKEBY");
        assert!(!kv.contains_key(KEY_REFUNDING));
        assert!(!kv.contains_key(KEY_MAX_BALANCE_AFTER_REFUND));
        assert_eq!(kv.get(KEY_MNEMONIC).unwrap(), "seed words");
    }

    #[tokio::test]
    async fn failed_refund_drops_recorded_max() {
        let (repo, state) = state_with(&[]).await;

        state.begin_refund(U256::from(7u64)).await.unwrap();
        state.record_refund_sent(U256::from(93u64), 5).await.unwrap();
        state.finish_refund(true).await.unwrap();

        assert!(repo.snapshot().is_empty());
    }
}
