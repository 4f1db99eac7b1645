//! Display helpers: addresses, balances, amounts and price deltas

use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::{Address, U256};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    /// Digits with at most one decimal point, empty allowed
    static ref AMOUNT_INPUT: Regex = Regex::new(r"^[0-9]*[.]?[0-9]*$").expect("valid amount regex");
}

/// `0x1234...abcd`
pub fn format_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

pub fn short_address(address: &Address) -> String {
    format_address(&address.to_checksum(None))
}

/// Compact balance display (K/M suffixes, 5 significant decimals)
pub fn format_currency(value: &str) -> String {
    let num: f64 = match value.trim().parse() {
        Ok(n) => n,
        Err(_) => return "0.00".to_string(),
    };

    if num > 1_000_000.0 {
        return format!("{:.2}M", num / 1_000_000.0);
    }
    if num > 1_000.0 {
        return format!("{:.2}K", num / 1_000.0);
    }
    if num < 0.00001 {
        return "< 0.00001".to_string();
    }

    trim_decimal_zeros(&format!("{:.5}", num))
}

/// Whether a keystroke leaves the amount field in a valid state
pub fn is_valid_amount_input(value: &str) -> bool {
    AMOUNT_INPUT.is_match(value)
}

/// Parse a decimal string into the token's smallest unit
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || !is_valid_amount_input(trimmed) || trimmed == "." {
        return Err(Error::InvalidInput(format!("'{}' is not a valid amount", amount)));
    }

    let mut normalized = trimmed.to_string();
    if normalized.starts_with('.') {
        normalized.insert(0, '0');
    }
    if normalized.ends_with('.') {
        normalized.push('0');
    }

    parse_units(&normalized, decimals)
        .map(|units| units.get_absolute())
        .map_err(|e| Error::InvalidInput(format!("'{}': {}", amount, e)))
}

/// Format a smallest-unit value as a decimal string without trailing zeros
pub fn format_amount(value: U256, decimals: u8) -> String {
    match format_units(value, decimals) {
        Ok(s) => trim_decimal_zeros(&s),
        Err(_) => value.to_string(),
    }
}

/// Round a decimal string for the read-only output field
pub fn to_fixed(value: f64, places: usize) -> String {
    format!("{:.*}", places, value)
}

/// Signed delta with up to four decimals and at least one, e.g. `+5.0`
pub fn format_price_delta(delta: f64) -> String {
    let mut body = trim_decimal_zeros(&format!("{:.4}", delta.abs()));
    if !body.contains('.') {
        body.push_str(".0");
    }
    if delta > 0.0 {
        format!("+{}", body)
    } else if delta < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

fn trim_decimal_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
