use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::constants::{GAS_STATION_UNIT_WEI, max_gas_price};
use crate::gas::GasOracle;
use crate::gas::errors::GasOracleError;
use crate::gas::types::GasEstimate;

#[derive(Clone)]
pub struct EthGasStationClient {
    http: Client,
    url: String,
}

impl EthGasStationClient {
    pub fn new(url: String) -> Result<Self, GasOracleError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url })
    }

    #[instrument(skip(self), fields(url = %self.url), level = "debug")]
    pub async fn fetch_estimate(&self) -> Result<GasEstimate, GasOracleError> {
        let resp = self.http.get(&self.url).send().await?.error_for_status()?;

        let estimate: GasEstimate = resp.json().await?;

        debug!(safe_low = estimate.safe_low, "gas estimate fetched");

        Ok(estimate)
    }
}

#[async_trait]
impl GasOracle for EthGasStationClient {
    async fn safe_low_gas_price(&self) -> Result<U256, GasOracleError> {
        let estimate = self.fetch_estimate().await?;
        let price = safe_low_to_wei(estimate.safe_low)?;
        Ok(price.min(max_gas_price()))
    }
}

/// Converts a `safeLow` quote (tenths of a gwei) into wei.
pub fn safe_low_to_wei(safe_low: f64) -> Result<U256, GasOracleError> {
    if !safe_low.is_finite() || safe_low < 0.0 {
        return Err(GasOracleError::InvalidResponse(safe_low.to_string()));
    }

    // sub-unit precision is irrelevant once clamped to 10 gwei
    let wei = (safe_low * GAS_STATION_UNIT_WEI as f64).round();
    if wei >= u128::MAX as f64 {
        return Err(GasOracleError::InvalidResponse(safe_low.to_string()));
    }

    Ok(U256::from(wei as u128))
}
