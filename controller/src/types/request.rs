use std::fmt;

use alloy::primitives::U256;

/// Amounts moved from the wallet into the channel in one deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelDepositRequest {
    pub amount_wei: U256,
    pub amount_token: U256,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurrencyKind {
    Wei,
    Token,
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyKind::Wei => f.write_str("wei"),
            CurrencyKind::Token => f.write_str("token"),
        }
    }
}

/// Request to convert channel balance of `currency` into the other asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub amount: U256,
    pub currency: CurrencyKind,
}
