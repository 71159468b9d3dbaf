//! Conversions between wei, channel token units and the USD reference.
//!
//! All on-chain amounts stay in integer base units; only the reference
//! amount shown to users is a `Decimal`. Integer divisions round down, so
//! a converted amount never exceeds its exact value.

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::error::ControllerError;
use crate::types::ExchangeRates;

/// Decimals of both ETH and the channel token.
const BASE_DECIMALS: u32 = 18;

/// Exchange rate split into an integer ratio `numerator / 10^scale`.
#[derive(Clone, Copy, Debug)]
struct RateRatio {
    numerator: U256,
    denominator: U256,
}

impl RateRatio {
    fn from_rates(rates: &ExchangeRates) -> Result<Self, ControllerError> {
        let rate = rates.usd_per_eth.normalize();
        if rate <= Decimal::ZERO {
            return Err(ControllerError::InvalidExchangeRate(rate.to_string()));
        }

        // mantissa is positive here, so the u128 conversion cannot fail
        let mantissa = u128::try_from(rate.mantissa())
            .map_err(|_| ControllerError::InvalidExchangeRate(rate.to_string()))?;

        Ok(Self {
            numerator: U256::from(mantissa),
            denominator: U256::from(10u128.pow(rate.scale())),
        })
    }
}

/// Token units worth `wei` at the current rate.
pub fn wei_to_token(wei: U256, rates: &ExchangeRates) -> Result<U256, ControllerError> {
    let ratio = RateRatio::from_rates(rates)?;
    let scaled = wei
        .checked_mul(ratio.numerator)
        .ok_or_else(|| ControllerError::AmountOutOfRange(wei.to_string()))?;
    Ok(scaled / ratio.denominator)
}

/// Wei worth `token` units at the current rate.
pub fn token_to_wei(token: U256, rates: &ExchangeRates) -> Result<U256, ControllerError> {
    let ratio = RateRatio::from_rates(rates)?;
    let scaled = token
        .checked_mul(ratio.denominator)
        .ok_or_else(|| ControllerError::AmountOutOfRange(token.to_string()))?;
    Ok(scaled / ratio.numerator)
}

/// USD value of `wei`, as a human-readable decimal.
pub fn wei_to_reference(wei: U256, rates: &ExchangeRates) -> Result<Decimal, ControllerError> {
    let token = wei_to_token(wei, rates)?;
    units_to_decimal(token)
}

/// Whole-unit decimal for an 18-decimal integer amount.
pub fn units_to_decimal(units: U256) -> Result<Decimal, ControllerError> {
    let out_of_range = || ControllerError::AmountOutOfRange(units.to_string());

    let raw = u128::try_from(units).map_err(|_| out_of_range())?;
    let raw = i128::try_from(raw).map_err(|_| out_of_range())?;

    Decimal::try_from_i128_with_scale(raw, BASE_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| out_of_range())
}
