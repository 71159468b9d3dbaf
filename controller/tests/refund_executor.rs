mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use alloy::primitives::U256;
use controller::error::ControllerError;
use controller::guard::{
    InMemoryKvRepository, KEY_MAX_BALANCE_AFTER_REFUND, KEY_MAX_BALANCE_RECORDED_AT,
    KEY_REFUNDING, ReconciliationState,
};
use controller::refund::RefundExecutor;
use support::*;

fn executor(chain: Arc<MockChain>) -> (Arc<InMemoryKvRepository>, RefundExecutor) {
    let repo = Arc::new(InMemoryKvRepository::new());
    let guard = Arc::new(ReconciliationState::new(
        repo.clone(),
        Duration::from_secs(600),
    ));
    let executor = RefundExecutor::new(chain, guard, WALLET, Duration::from_secs(5));
    (repo, executor)
}

#[tokio::test]
async fn refund_goes_to_latest_sender_and_records_ceiling() {
    let chain = MockChain::new(U256::from(1_000u64), U256::ZERO);
    let (repo, executor) = executor(chain.clone());

    let receipt = executor
        .refund_excess(U256::from(300u64), 42)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(receipt.transaction_hash, "0xfeed");
    assert_eq!(*chain.sent.lock(), vec![(FUNDER, U256::from(300u64))]);

    let kv = repo.snapshot();
    assert!(!kv.contains_key(KEY_REFUNDING));
    assert_eq!(kv.get(KEY_MAX_BALANCE_AFTER_REFUND).unwrap(), "700");
    assert_eq!(kv.get(KEY_MAX_BALANCE_RECORDED_AT).unwrap(), "42");
}

#[tokio::test]
async fn zero_refund_is_a_noop() {
    let chain = MockChain::new(U256::from(1_000u64), U256::ZERO);
    let (repo, executor) = executor(chain.clone());

    assert!(executor.refund_excess(U256::ZERO, 0).await.unwrap().is_none());
    assert!(chain.sent.lock().is_empty());
    assert!(repo.snapshot().is_empty());
}

#[tokio::test]
async fn missing_sender_clears_guards() {
    let chain = MockChain::new(U256::from(1_000u64), U256::ZERO);
    *chain.latest_sender.lock() = None;
    let (repo, executor) = executor(chain.clone());

    let err = executor
        .refund_excess(U256::from(300u64), 0)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ControllerError>(),
        Some(ControllerError::RefundSenderNotFound(_))
    ));
    assert!(repo.snapshot().is_empty());
    assert!(chain.sent.lock().is_empty());
}

#[tokio::test]
async fn failed_send_drops_recorded_ceiling() {
    let chain = MockChain::new(U256::from(1_000u64), U256::ZERO);
    chain.fail_send.store(true, Ordering::SeqCst);
    let (repo, executor) = executor(chain);

    assert!(executor.refund_excess(U256::from(300u64), 0).await.is_err());
    assert!(repo.snapshot().is_empty());
}
