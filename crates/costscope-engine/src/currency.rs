//! Currency conversion against caller-supplied exchange rates.
//!
//! The engine itself never converts currencies -- attribution rejects
//! mixed-currency input outright. This entry point exists for callers that
//! want to bring their own rate table (reporting layers, mostly) and is
//! deliberately minimal: exact rate lookup, no rate discovery, no
//! triangulation through intermediate currencies.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use costscope_types::Currency;

use crate::error::EngineError;

/// Convert an amount between currencies using an explicit rate table.
///
/// Rates are keyed `"{FROM}_{TO}"` in ISO codes, for example `"USD_EUR"`.
/// Conversion between a currency and itself is the identity and needs no
/// table entry.
///
/// # Errors
///
/// Returns [`EngineError::ExchangeRateNotFound`] when the table has no
/// entry for the requested pair, and [`EngineError::ArithmeticOverflow`]
/// if the converted amount exceeds the decimal range.
pub fn convert(
    amount: Decimal,
    from: Currency,
    to: Currency,
    rates: &BTreeMap<String, Decimal>,
) -> Result<Decimal, EngineError> {
    if from == to {
        return Ok(amount);
    }

    let key = format!("{}_{}", from.code(), to.code());
    let rate = rates
        .get(&key)
        .ok_or(EngineError::ExchangeRateNotFound { key })?;

    amount
        .checked_mul(*rate)
        .ok_or(EngineError::ArithmeticOverflow {
            context: "currency conversion",
        })
}
