pub mod client;
pub mod errors;
pub mod types;

use alloy::primitives::U256;
use async_trait::async_trait;

pub use client::EthGasStationClient;
pub use errors::GasOracleError;
pub use types::*;

/// Source of the recommended "safe low" gas price.
///
/// Implementations clamp to `MAX_GAS_PRICE_WEI` and never retry; callers
/// decide how to degrade on failure.
#[async_trait]
pub trait GasOracle: Send + Sync + 'static {
    async fn safe_low_gas_price(&self) -> Result<U256, GasOracleError>;
}
