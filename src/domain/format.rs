//! Base-unit balance formatting.

use num_bigint::BigUint;
use tracing::warn;

/// Convert a raw balance in base units into a human-readable decimal string.
///
/// `raw_balance` is an arbitrary-precision unsigned integer serialized as a
/// decimal string; Starknet Uint256 values routinely exceed 64 bits, so the
/// arithmetic is done in `BigUint`, never in floating point.
///
/// An empty input yields `"0"`. Non-numeric input is returned unchanged:
/// this function sits on display paths only, and a garbled balance must not
/// take down the read that carries it. Do not rely on the lenient behavior
/// for machine-readable values.
#[must_use]
pub fn format_token_balance(raw_balance: &str, decimals: u32) -> String {
    if raw_balance.is_empty() {
        return "0".to_string();
    }

    let Some(value) = BigUint::parse_bytes(raw_balance.as_bytes(), 10) else {
        warn!(raw = %raw_balance, "Non-numeric balance passed through unformatted");
        return raw_balance.to_string();
    };

    let divisor = BigUint::from(10u32).pow(decimals);
    let whole = &value / &divisor;
    let fractional = &value % &divisor;

    let mut fractional_str = fractional.to_str_radix(10);
    // Left-pad to exactly `decimals` digits, then strip trailing zeros
    while (fractional_str.len() as u32) < decimals {
        fractional_str.insert(0, '0');
    }
    let fractional_str = fractional_str.trim_end_matches('0');

    if fractional_str.is_empty() {
        whole.to_str_radix(10)
    } else {
        format!("{}.{}", whole.to_str_radix(10), fractional_str)
    }
}
