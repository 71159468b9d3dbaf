//! Channel limits and gas budgets.
//!
//! The hub enforces the same channel max/min values, so changing them here
//! without a matching hub release only makes deposits get rejected upstream.

use std::time::Duration;

use alloy::primitives::U256;

/// One whole unit of an 18-decimal asset (ETH or the channel token).
pub const UNIT: u128 = 10u128.pow(18);

/// Gas a channel deposit is expected to consume.
pub const DEPOSIT_ESTIMATED_GAS: u64 = 700_000;

/// Safety multiplier on top of the channel client's own 1.5x gas margin.
pub const DEPOSIT_GAS_SAFETY_MULTIPLIER: u64 = 2;

/// Ceiling applied to the oracle gas price (10 gwei).
pub const MAX_GAS_PRICE_WEI: u64 = 10_000_000_000;

/// Wei per unit of the gas station's `safeLow` field (tenths of a gwei).
pub const GAS_STATION_UNIT_WEI: u64 = 100_000_000;

/// Largest token balance the hub will exchange into (69 tokens).
pub const HUB_EXCHANGE_CEILING_TOKEN: u128 = 69 * UNIT;

/// Absolute channel deposit maximum (30 tokens).
pub const CHANNEL_DEPOSIT_MAX_TOKEN: u128 = 30 * UNIT;

/// Channel token balance treated as "already at maximum" (29.8 tokens).
/// Sits below the deposit max to absorb rounding in the hub's conversions.
pub const CHANNEL_NEAR_MAX_TOKEN: u128 = 298 * UNIT / 10;

/// Blocks scanned backwards when looking for the sender to refund.
pub const REFUND_LOOKBACK_BLOCKS: u64 = 100;

pub const DEFAULT_DEPOSIT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SWAP_INTERVAL: Duration = Duration::from_secs(1);

pub fn max_gas_price() -> U256 {
    U256::from(MAX_GAS_PRICE_WEI)
}

pub fn hub_exchange_ceiling() -> U256 {
    U256::from(HUB_EXCHANGE_CEILING_TOKEN)
}

pub fn channel_deposit_max() -> U256 {
    U256::from(CHANNEL_DEPOSIT_MAX_TOKEN)
}

pub fn channel_near_max() -> U256 {
    U256::from(CHANNEL_NEAR_MAX_TOKEN)
}
