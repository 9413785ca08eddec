//! Currency cleaning and formatting.
//!
//! Source sheets mix numeric cells with text such as `"$1,234.56"`. Every amount goes
//! through [`parse_currency_or_zero`], which never fails: anything that does not
//! clean to a non-negative decimal no larger than [`MAX_AMOUNT_UNITS`] becomes zero.
//! Silent zeros can hide dirty data,
//! but a run is never aborted over a single bad cell.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest amount, in whole dollars, a single cell may carry. Larger values are
/// treated as garbage and clean to zero, which keeps every sum of amounts far from
/// the decimal range.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000_000;

/// Whether `value` lies within `0..=MAX_AMOUNT_UNITS`.
pub fn is_plausible_amount(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::from(MAX_AMOUNT_UNITS)
}

/// Sum amounts, or `None` if the sum leaves the decimal range.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

/// Strip `$` and `,` and coerce to a decimal, falling back to zero.
///
/// Negative, non-finite and implausibly large inputs also fall back to zero, so the
/// result is always a non-negative decimal. Scientific notation (`"1e3"`) is accepted because numeric
/// cells can be rendered that way.
pub fn parse_currency_or_zero(text: &str) -> Decimal {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let parsed = Decimal::from_str(cleaned).or_else(|e| {
        // Exponents past the 28-digit scale cannot be represented anyway.
        match cleaned.split_once(['e', 'E']) {
            Some((_, exp)) if exp.parse::<i32>().is_ok_and(|x| x.abs() <= 28) => {
                Decimal::from_scientific(cleaned)
            }
            _ => Err(e),
        }
    });
    match parsed {
        Ok(value) if is_plausible_amount(value) => value.normalize(),
        _ => Decimal::ZERO,
    }
}

/// Coerce a day count. Integral decimals (`"31.0"`) are accepted, anything else is zero.
pub fn parse_days_or_zero(text: &str) -> i64 {
    let cleaned = text.trim();
    if let Ok(days) = cleaned.parse::<i64>() {
        return days.max(0);
    }
    match Decimal::from_str(cleaned) {
        Ok(value) if value.fract().is_zero() && value >= Decimal::ZERO => {
            value.to_i64().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Round to cents using banker's rounding (half to even). The result always carries
/// two decimal places, so `450.5` comes back as `450.50`.
pub fn round_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(2);
    rounded
}

/// Format as `$#,##0.00`, e.g. `1234.5` → `"$1,234.50"`.
pub fn format_currency(value: Decimal) -> String {
    let rounded = round_cents(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-${grouped}.{cents}")
    } else {
        format!("${grouped}.{cents}")
    }
}
