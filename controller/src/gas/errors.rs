use thiserror::Error;

#[derive(Error, Debug)]
pub enum GasOracleError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid gas price in oracle response: {0}")]
    InvalidResponse(String),
}
