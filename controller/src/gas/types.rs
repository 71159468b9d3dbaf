use serde::Deserialize;

/// Subset of the ETH Gas Station `ethgasAPI.json` payload.
///
/// Prices are quoted in tenths of a gwei.
#[derive(Debug, Deserialize)]
pub struct GasEstimate {
    #[serde(rename = "safeLow")]
    pub safe_low: f64,
}
