//! Conversion between decimal coin strings and integer base units.
//!
//! Everything in the engine is an integer number of satoshis; these helpers
//! exist only for the command-line edge and never touch floating point.

use crate::error::PlanError;

/// Base units per whole coin.
pub const SATOSHIS_PER_COIN: u64 = 100_000_000;

/// Number of fractional digits in a coin amount.
const DECIMALS: usize = 8;

/// Base units per thousandth of a coin, the display unit of face values.
const SATOSHIS_PER_MILLI: u64 = 100_000;

/// No single amount, balance or payment total may exceed the money supply.
pub const MAX_MONEY: u64 = 21_000_000 * SATOSHIS_PER_COIN;

/// Reject amounts above [`MAX_MONEY`].
pub fn check_money(what: &str, satoshis: u64) -> Result<u64, PlanError> {
    if satoshis > MAX_MONEY {
        return Err(PlanError::InvalidAmount(format!(
            "{what} of {satoshis} sat is too large (limit {MAX_MONEY} sat)"
        )));
    }
    Ok(satoshis)
}

/// Parse a decimal coin amount such as `"1.25"` or `".001"` into satoshis.
pub fn parse_amount(input: &str) -> Result<u64, PlanError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(PlanError::InvalidAmount("empty amount".into()));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(PlanError::InvalidAmount(format!("'{input}' has no digits")));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PlanError::InvalidAmount(format!("'{input}' is not a decimal number")));
    }
    if frac.len() > DECIMALS {
        return Err(PlanError::InvalidAmount(format!(
            "'{input}' has more than {DECIMALS} decimal places"
        )));
    }

    let whole_sats = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .ok()
            .and_then(|w| w.checked_mul(SATOSHIS_PER_COIN))
            .ok_or_else(|| PlanError::InvalidAmount(format!("'{input}' is too large")))?
    };

    let frac_sats = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS);
        padded
            .parse::<u64>()
            .map_err(|e| PlanError::InvalidAmount(format!("'{input}': {e}")))?
    };

    let total = whole_sats
        .checked_add(frac_sats)
        .ok_or_else(|| PlanError::InvalidAmount(format!("'{input}' is too large")))?;
    check_money("amount", total)
}

/// Format satoshis as `"1.5001 2345"`: eight decimals, grouped in fours.
pub fn format_amount(satoshis: u64) -> String {
    let whole = satoshis / SATOSHIS_PER_COIN;
    let frac = satoshis % SATOSHIS_PER_COIN;
    format!("{whole}.{:04} {:04}", frac / 10_000, frac % 10_000)
}

/// Format the face value of `satoshis` with three decimals, truncating
/// anything below a thousandth of a coin.
pub fn format_face(satoshis: u64) -> String {
    let milli = satoshis / SATOSHIS_PER_MILLI;
    format!("{}.{:03}", milli / 1000, milli % 1000)
}
