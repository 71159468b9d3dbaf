//! Wallet balance reserved for future deposit gas.
//!
//! Funds below the floor stay in the wallet so the next deposit can still
//! pay for itself.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::constants::{DEPOSIT_ESTIMATED_GAS, DEPOSIT_GAS_SAFETY_MULTIPLIER, max_gas_price};
use crate::currency::wei_to_reference;
use crate::error::ControllerError;
use crate::gas::GasOracle;
use crate::types::RuntimeState;

/// Smallest wallet balance that must stay un-deposited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrowserMinimumBalance {
    pub wei_amount: U256,
    /// USD value of `wei_amount`; zero when no rate was available.
    pub reference_currency_amount: Decimal,
}

/// Wei floor for a given (unclamped) gas price.
pub fn minimum_balance_wei(gas_price: U256) -> U256 {
    let price = gas_price.min(max_gas_price());
    U256::from(DEPOSIT_ESTIMATED_GAS) * U256::from(DEPOSIT_GAS_SAFETY_MULTIPLIER) * price
}

pub struct MinimumBalanceCalculator {
    oracle: Arc<dyn GasOracle>,
}

impl MinimumBalanceCalculator {
    pub fn new(oracle: Arc<dyn GasOracle>) -> Self {
        Self { oracle }
    }

    /// Fetches the current gas price and derives the floor.
    ///
    /// Oracle failures propagate; a missing or unusable exchange rate only
    /// zeroes the reference amount.
    #[instrument(skip_all, level = "debug")]
    pub async fn compute_minimum_balance(
        &self,
        runtime: Option<&RuntimeState>,
    ) -> Result<BrowserMinimumBalance, ControllerError> {
        let gas_price = self.oracle.safe_low_gas_price().await?;
        let wei_amount = minimum_balance_wei(gas_price);

        let reference_currency_amount = match runtime.and_then(|r| r.exchange_rate.as_ref()) {
            Some(rates) => wei_to_reference(wei_amount, rates).unwrap_or_else(|e| {
                warn!(error = %e, "unusable exchange rate; minimum balance has no reference amount");
                Decimal::ZERO
            }),
            None => {
                warn!("no exchange rate yet; minimum balance has no reference amount");
                Decimal::ZERO
            }
        };

        debug!(
            gas_price = %gas_price,
            wei = %wei_amount,
            usd = %reference_currency_amount,
            "minimum balance computed"
        );

        Ok(BrowserMinimumBalance {
            wei_amount,
            reference_currency_amount,
        })
    }
}

#[derive(Clone, Copy)]
struct CachedMinimum {
    value: BrowserMinimumBalance,
    computed_ms: u64,
}

/// Last computed floor plus its age.
///
/// Refreshes lazily once older than `refresh_every`. A failed refresh keeps
/// serving the previous value.
pub struct MinimumBalanceCache {
    calculator: MinimumBalanceCalculator,
    refresh_every: Duration,
    current: RwLock<Option<CachedMinimum>>,
}

impl MinimumBalanceCache {
    pub fn new(calculator: MinimumBalanceCalculator, refresh_every: Duration) -> Self {
        Self {
            calculator,
            refresh_every,
            current: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Option<BrowserMinimumBalance> {
        (*self.current.read()).map(|c| c.value)
    }

    /// Recomputes unconditionally and stores the result.
    pub async fn refresh(
        &self,
        runtime: Option<&RuntimeState>,
        now_ms: u64,
    ) -> Result<BrowserMinimumBalance, ControllerError> {
        let value = self.calculator.compute_minimum_balance(runtime).await?;
        *self.current.write() = Some(CachedMinimum {
            value,
            computed_ms: now_ms,
        });
        info!(wei = %value.wei_amount, usd = %value.reference_currency_amount, "minimum balance updated");
        Ok(value)
    }

    /// Returns the cached floor, refreshing it first when missing or stale.
    pub async fn get_or_refresh(
        &self,
        runtime: Option<&RuntimeState>,
        now_ms: u64,
    ) -> Option<BrowserMinimumBalance> {
        let cached = *self.current.read();

        let stale = match cached {
            Some(c) => now_ms.saturating_sub(c.computed_ms) >= self.refresh_every.as_millis() as u64,
            None => true,
        };

        if !stale {
            return cached.map(|c| c.value);
        }

        match self.refresh(runtime, now_ms).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "minimum balance refresh failed; keeping previous value");
                cached.map(|c| c.value)
            }
        }
    }
}
