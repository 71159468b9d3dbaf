use std::time::Duration;

use thiserror::Error;

use crate::gas::GasOracleError;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("exchange rate must be positive, got {0}")]
    InvalidExchangeRate(String),

    #[error("amount out of range for conversion: {0}")]
    AmountOutOfRange(String),

    #[error("gas oracle failed: {0}")]
    GasOracle(#[from] GasOracleError),

    #[error("channel client failed to initialize: {0}")]
    ChannelInit(String),

    #[error("unrecognized network: {0}")]
    UnknownNetwork(String),

    #[error("wallet mnemonic not found in persisted state")]
    MissingMnemonic,

    #[error("{label} timed out after {timeout:?}")]
    Timeout { label: &'static str, timeout: Duration },

    #[error("no sender to {0} found in the recent blocks")]
    RefundSenderNotFound(String),
}
