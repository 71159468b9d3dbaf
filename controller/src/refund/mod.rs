//! Excess-deposit detection and the (dormant) refund transaction.

pub mod executor;

use alloy::primitives::U256;

use crate::constants::{channel_deposit_max, hub_exchange_ceiling};
use crate::currency::token_to_wei;
use crate::error::ControllerError;
use crate::types::ExchangeRates;

pub use executor::{RefundExecutor, TransactionReceipt};

/// Largest wei deposit the channel accepts at the current rate.
///
/// The token ceiling is the smaller of what the hub will exchange and the
/// absolute channel deposit max.
pub fn channel_ceiling_wei(rates: &ExchangeRates) -> Result<U256, ControllerError> {
    let ceiling_token = hub_exchange_ceiling().min(channel_deposit_max());
    token_to_wei(ceiling_token, rates)
}

/// Wei that must be held back from a deposit of `amount_wei`.
pub fn compute_refund(amount_wei: U256, ceiling_wei: U256) -> U256 {
    amount_wei.saturating_sub(ceiling_wei)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]
        #[test]
        fn refund_is_pure_and_clamped(amount in any::<u128>(), ceiling in any::<u128>()) {
            let a = U256::from(amount);
            let c = U256::from(ceiling);

            let first = compute_refund(a, c);
            let second = compute_refund(a, c);
            prop_assert_eq!(first, second);

            if amount <= ceiling {
                prop_assert_eq!(first, U256::ZERO);
            } else {
                prop_assert_eq!(first, U256::from(amount - ceiling));
            }
        }
    }
}
