pub mod channel;
pub mod request;

pub use channel::{ChannelState, ExchangeRates, RuntimeState, StateSnapshot, TxFlags};
pub use request::{ChannelDepositRequest, CurrencyKind, ExchangeRequest};
