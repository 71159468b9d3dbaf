//! Moves spare wallet funds into the channel.
//!
//! `evaluate_deposit` is the pure policy: given balances, runtime flags and
//! the current ceiling it returns either a request or the reason to skip.
//! [`DepositReconciler`] gathers those inputs (snapshot, balances, guard
//! flags) and submits at most one deposit per cycle.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::{InFlightKind, ReconcilerSettings, in_flight};
use crate::channel::{ChannelClient, SnapshotStore};
use crate::chain::ChainClient;
use crate::constants::channel_near_max;
use crate::events::{PolicyWarning, WarningBus};
use crate::guard::{GuardCheck, ReconciliationState};
use crate::logger::{SLOW_CALL, warn_if_slow};
use crate::metrics::counters::Counters;
use crate::minimum_balance::MinimumBalanceCache;
use crate::refund::{channel_ceiling_wei, compute_refund};
use crate::time::bounded;
use crate::types::{ChannelDepositRequest, ChannelState, ExchangeRates, RuntimeState};

/// Why a deposit cycle ended without a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No channel snapshot, channel state or minimum balance yet.
    NotReady,
    Refunding,
    RefundNotLanded { expected_max: U256 },
    EmptyWallet,
    BelowMinimum { balance: U256, minimum: U256 },
    InFlight(InFlightKind),
    NearChannelMax { balance_token: U256 },
    NothingToDeposit,
    /// The ceiling cannot be expressed in wei without a usable rate.
    NoExchangeRate,
    ExceedsCeiling { excess_wei: U256 },
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotReady => "not_ready",
            SkipReason::Refunding => "refunding",
            SkipReason::RefundNotLanded { .. } => "refund_not_landed",
            SkipReason::EmptyWallet => "empty_wallet",
            SkipReason::BelowMinimum { .. } => "below_minimum",
            SkipReason::InFlight(_) => "in_flight",
            SkipReason::NearChannelMax { .. } => "near_channel_max",
            SkipReason::NothingToDeposit => "nothing_to_deposit",
            SkipReason::NoExchangeRate => "no_exchange_rate",
            SkipReason::ExceedsCeiling { .. } => "exceeds_ceiling",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepositDecision {
    Submit(ChannelDepositRequest),
    Skip(SkipReason),
}

impl DepositDecision {
    pub fn request(&self) -> Option<&ChannelDepositRequest> {
        match self {
            DepositDecision::Submit(r) => Some(r),
            DepositDecision::Skip(_) => None,
        }
    }
}

/// Everything the deposit policy looks at, already fetched.
#[derive(Clone, Copy, Debug)]
pub struct DepositInputs<'a> {
    pub wallet_wei: U256,
    pub wallet_token: U256,
    pub minimum_wei: U256,
    pub channel: Option<&'a ChannelState>,
    pub runtime: &'a RuntimeState,
    /// Channel ceiling in wei; `None` without a usable exchange rate.
    pub ceiling_wei: Option<U256>,
}

/// Decides whether a deposit may be submitted, and for how much.
///
/// Order matters: every check short-circuits, and the in-flight lock is
/// only consulted once the wallet is known to hold something depositable.
pub fn evaluate_deposit(inputs: &DepositInputs<'_>) -> DepositDecision {
    use DepositDecision::Skip;

    if inputs.wallet_wei.is_zero() && inputs.wallet_token.is_zero() {
        return Skip(SkipReason::EmptyWallet);
    }

    if inputs.wallet_wei < inputs.minimum_wei {
        return Skip(SkipReason::BelowMinimum {
            balance: inputs.wallet_wei,
            minimum: inputs.minimum_wei,
        });
    }

    if let Some(kind) = in_flight(inputs.runtime) {
        return Skip(SkipReason::InFlight(kind));
    }

    let Some(channel) = inputs.channel else {
        return Skip(SkipReason::NotReady);
    };

    if channel.balance_token_user >= channel_near_max() {
        return Skip(SkipReason::NearChannelMax {
            balance_token: channel.balance_token_user,
        });
    }

    let request = ChannelDepositRequest {
        amount_wei: inputs.wallet_wei - inputs.minimum_wei,
        amount_token: inputs.wallet_token,
    };

    if request.amount_wei.is_zero() && request.amount_token.is_zero() {
        return Skip(SkipReason::NothingToDeposit);
    }

    let Some(ceiling_wei) = inputs.ceiling_wei else {
        return Skip(SkipReason::NoExchangeRate);
    };

    let excess_wei = compute_refund(request.amount_wei, ceiling_wei);
    if !excess_wei.is_zero() {
        return Skip(SkipReason::ExceedsCeiling { excess_wei });
    }

    DepositDecision::Submit(request)
}

/// Converts the channel ceiling at `rates`, logging and dropping bad rates.
fn ceiling_for(rates: Option<&ExchangeRates>) -> Option<U256> {
    let rates = rates?;
    match channel_ceiling_wei(rates) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(error = %e, "unusable exchange rate; ceiling unknown");
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlightObservation {
    kind: InFlightKind,
    since_ms: u64,
}

pub struct DepositReconciler {
    channel: Arc<dyn ChannelClient>,
    chain: Arc<dyn ChainClient>,
    snapshots: SnapshotStore,
    minimum: Arc<MinimumBalanceCache>,
    guard: Arc<ReconciliationState>,
    warnings: WarningBus,
    counters: Counters,
    settings: ReconcilerSettings,
    in_flight_since: Mutex<Option<InFlightObservation>>,
}

impl DepositReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: Arc<dyn ChannelClient>,
        chain: Arc<dyn ChainClient>,
        snapshots: SnapshotStore,
        minimum: Arc<MinimumBalanceCache>,
        guard: Arc<ReconciliationState>,
        warnings: WarningBus,
        counters: Counters,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            channel,
            chain,
            snapshots,
            minimum,
            guard,
            warnings,
            counters,
            settings,
            in_flight_since: Mutex::new(None),
        }
    }

    /// One reconciliation pass. Submits the deposit when the policy allows.
    #[instrument(skip(self), target = "reconciler", name = "deposit_cycle")]
    pub async fn run_cycle(&self, now_ms: u64) -> anyhow::Result<DepositDecision> {
        Counters::bump(&self.counters.deposit_cycles);

        let decision = self.decide(now_ms).await?;

        match &decision {
            DepositDecision::Submit(request) => {
                info!(
                    amount_wei = %request.amount_wei,
                    amount_token = %request.amount_token,
                    "submitting channel deposit"
                );
                bounded(
                    "channel_deposit",
                    self.settings.call_timeout,
                    self.channel.deposit(request.clone()),
                )
                .await??;
                Counters::bump(&self.counters.deposits_submitted);
            }
            DepositDecision::Skip(reason) => {
                Counters::bump(&self.counters.deposit_skips);
                self.report_skip(reason);
            }
        }

        Ok(decision)
    }

    async fn decide(&self, now_ms: u64) -> anyhow::Result<DepositDecision> {
        let Some(snapshot) = self.snapshots.latest() else {
            return Ok(DepositDecision::Skip(SkipReason::NotReady));
        };
        let runtime = &snapshot.runtime;

        self.watch_in_flight(runtime, now_ms);

        let Some(minimum) = self.current_minimum(runtime, now_ms).await else {
            return Ok(DepositDecision::Skip(SkipReason::NotReady));
        };

        if self.guard.is_refunding().await? {
            return Ok(DepositDecision::Skip(SkipReason::Refunding));
        }

        let wallet = self.channel.wallet_address();
        let wallet_wei = bounded(
            "get_balance",
            self.settings.call_timeout,
            warn_if_slow("get_balance", SLOW_CALL, self.chain.get_balance(wallet)),
        )
        .await??;

        match self.guard.settle(wallet_wei, now_ms).await? {
            GuardCheck::Refunding => return Ok(DepositDecision::Skip(SkipReason::Refunding)),
            GuardCheck::RefundPending { expected_max } => {
                return Ok(DepositDecision::Skip(SkipReason::RefundNotLanded {
                    expected_max,
                }));
            }
            GuardCheck::StaleCleared { expected_max } => {
                Counters::bump(&self.counters.stale_refund_guards);
                self.warnings
                    .emit(PolicyWarning::StaleRefundGuard { expected_max });
            }
            GuardCheck::Clear | GuardCheck::Cleared => {}
        }

        let wallet_token = self.token_balance(wallet).await;

        Ok(evaluate_deposit(&DepositInputs {
            wallet_wei,
            wallet_token,
            minimum_wei: minimum,
            channel: snapshot.channel.as_ref(),
            runtime,
            ceiling_wei: ceiling_for(runtime.exchange_rate.as_ref()),
        }))
    }

    async fn current_minimum(&self, runtime: &RuntimeState, now_ms: u64) -> Option<U256> {
        let refreshed = bounded(
            "minimum_balance",
            self.settings.call_timeout,
            self.minimum.get_or_refresh(Some(runtime), now_ms),
        )
        .await;

        match refreshed {
            Ok(m) => m.map(|m| m.wei_amount),
            Err(e) => {
                warn!(error = %e, "minimum balance refresh timed out");
                self.minimum.get().map(|m| m.wei_amount)
            }
        }
    }

    /// Token balance, or zero with a warning when the read fails.
    async fn token_balance(&self, wallet: Address) -> U256 {
        let token = self.channel.token_address();
        let read = bounded(
            "get_token_balance",
            self.settings.call_timeout,
            self.chain.get_token_balance(token, wallet),
        )
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r);

        match read {
            Ok(b) => b,
            Err(e) => {
                warn!(
                    error = ?e,
                    token = %token,
                    "error fetching token balance; is the token address correct for this network?"
                );
                self.warnings.emit(PolicyWarning::TokenBalanceUnavailable {
                    reason: e.to_string(),
                });
                U256::ZERO
            }
        }
    }

    /// Tracks how long the same operation has been submitted without a
    /// hash. The lock is honoured regardless; this only reports it.
    fn watch_in_flight(&self, runtime: &RuntimeState, now_ms: u64) {
        let mut since = self.in_flight_since.lock();

        let Some(kind) = in_flight(runtime) else {
            *since = None;
            return;
        };

        let observed = match *since {
            Some(o) if o.kind == kind => o,
            _ => {
                let o = InFlightObservation {
                    kind,
                    since_ms: now_ms,
                };
                *since = Some(o);
                o
            }
        };

        let age_ms = now_ms.saturating_sub(observed.since_ms);
        if age_ms >= self.settings.stale_in_flight_after.as_millis() as u64 {
            error!(
                kind = %kind,
                age_ms,
                "operation submitted without a transaction hash for too long"
            );
            Counters::bump(&self.counters.stale_in_flight);
            self.warnings.emit(PolicyWarning::StaleInFlight {
                kind,
                since_ms: observed.since_ms,
            });
        }
    }

    fn report_skip(&self, reason: &SkipReason) {
        match *reason {
            SkipReason::NearChannelMax { balance_token } => {
                warn!(balance_token = %balance_token, "channel already at maximum; refusing to deposit");
                self.warnings
                    .emit(PolicyWarning::NearChannelMax { balance_token });
            }
            SkipReason::ExceedsCeiling { excess_wei } => {
                warn!(excess_wei = %excess_wei, "deposit exceeds channel ceiling; withholding");
                Counters::bump(&self.counters.deposits_withheld);
                self.warnings
                    .emit(PolicyWarning::ExceedsCeiling { excess_wei });
            }
            SkipReason::NoExchangeRate => {
                warn!("no exchange rate; cannot check deposit against the channel ceiling");
            }
            other => debug!(reason = ?other, "deposit skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxFlags;

    fn u(n: u64) -> U256 {
        U256::from(n)
    }

    fn channel(token: U256) -> ChannelState {
        ChannelState {
            balance_wei_user: U256::ZERO,
            balance_token_user: token,
        }
    }

    fn inputs<'a>(
        wallet_wei: u64,
        wallet_token: u64,
        minimum_wei: u64,
        channel: &'a ChannelState,
        runtime: &'a RuntimeState,
    ) -> DepositInputs<'a> {
        DepositInputs {
            wallet_wei: u(wallet_wei),
            wallet_token: u(wallet_token),
            minimum_wei: u(minimum_wei),
            channel: Some(channel),
            runtime,
            ceiling_wei: Some(u(1_000_000)),
        }
    }

    #[test]
    fn deposits_balance_above_minimum_with_wallet_tokens() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&inputs(5, 7, 1, &ch, &rt));

        assert_eq!(
            out,
            DepositDecision::Submit(ChannelDepositRequest {
                amount_wei: u(4),
                amount_token: u(7),
            })
        );
    }

    #[test]
    fn empty_wallet_is_skipped() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&inputs(0, 0, 1, &ch, &rt));
        assert_eq!(out, DepositDecision::Skip(SkipReason::EmptyWallet));
    }

    #[test]
    fn below_minimum_is_skipped() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&inputs(1, 50, 2, &ch, &rt));
        assert_eq!(
            out,
            DepositDecision::Skip(SkipReason::BelowMinimum {
                balance: u(1),
                minimum: u(2)
            })
        );
    }

    #[test]
    fn in_flight_deposit_blocks_regardless_of_balance() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState {
            deposit: TxFlags {
                submitted: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = evaluate_deposit(&inputs(1_000, 0, 1, &ch, &rt));
        assert_eq!(
            out,
            DepositDecision::Skip(SkipReason::InFlight(InFlightKind::Deposit))
        );
    }

    #[test]
    fn near_channel_max_refuses() {
        let ch = channel(channel_near_max());
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&inputs(5, 0, 1, &ch, &rt));
        assert!(matches!(
            out,
            DepositDecision::Skip(SkipReason::NearChannelMax { .. })
        ));
    }

    #[test]
    fn excess_over_ceiling_withholds_whole_deposit() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&DepositInputs {
            ceiling_wei: Some(u(30)),
            ..inputs(1_000, 0, 1, &ch, &rt)
        });
        assert_eq!(
            out,
            DepositDecision::Skip(SkipReason::ExceedsCeiling { excess_wei: u(969) })
        );
    }

    #[test]
    fn exactly_minimum_with_no_tokens_is_nothing_to_deposit() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&inputs(3, 0, 3, &ch, &rt));
        assert_eq!(out, DepositDecision::Skip(SkipReason::NothingToDeposit));
    }

    #[test]
    fn missing_ceiling_fails_closed() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&DepositInputs {
            ceiling_wei: None,
            ..inputs(5, 0, 1, &ch, &rt)
        });
        assert_eq!(out, DepositDecision::Skip(SkipReason::NoExchangeRate));
    }

    #[test]
    fn missing_channel_state_is_not_ready() {
        let ch = channel(U256::ZERO);
        let rt = RuntimeState::default();
        let out = evaluate_deposit(&DepositInputs {
            channel: None,
            ..inputs(5, 0, 1, &ch, &rt)
        });
        assert_eq!(out, DepositDecision::Skip(SkipReason::NotReady));
    }
}
