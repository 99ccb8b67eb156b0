//! Satoshi amount to fiat conversion
//!
//! Pure and synchronous: the same input string and price always produce the
//! same pair of output strings. Unusable input clears both outputs instead of
//! rendering zero, so "nothing to convert" stays distinguishable from "0.00".

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::ledger::SATS_PER_BTC;
use crate::price::PriceSnapshot;

pub const MIN_FRACTION_DIGITS: usize = 2;
pub const MAX_FRACTION_DIGITS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub usd: String,
    pub eur: String,
}

impl Conversion {
    pub fn is_empty(&self) -> bool {
        self.usd.is_empty() && self.eur.is_empty()
    }
}

/// Parse a free-form sats amount such as `"100,000"`
pub fn parse_sats(input: &str) -> Result<f64, SyncError> {
    let cleaned: String = input.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(SyncError::Parse("empty amount".to_string()));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SyncError::Parse(format!("not a number: {}", cleaned)))
}

/// Convert a sats amount at `price`; empty outputs without a usable amount or price
pub fn convert_sats(input: &str, price: Option<&PriceSnapshot>) -> Conversion {
    let (Some(sats), Some(price)) = (parse_sats(input).ok(), price) else {
        return Conversion::default();
    };
    if !price.is_populated() {
        return Conversion::default();
    }

    let btc = sats / SATS_PER_BTC;
    Conversion {
        usd: format_number(btc * price.btc_price_usd, MIN_FRACTION_DIGITS, MAX_FRACTION_DIGITS),
        eur: format_number(btc * price.btc_price_eur, MIN_FRACTION_DIGITS, MAX_FRACTION_DIGITS),
    }
}

/// en-US style number: comma grouping, between `min_fraction` and
/// `max_fraction` fractional digits (trailing zeros trimmed down to the minimum)
pub fn format_number(value: f64, min_fraction: usize, max_fraction: usize) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let max_fraction = max_fraction.clamp(min_fraction, 20);

    let fixed = format!("{:.*}", max_fraction, value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut fraction = frac_part.trim_end_matches('0').to_string();
    while fraction.len() < min_fraction {
        fraction.push('0');
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(&fraction);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(usd: f64, eur: f64) -> PriceSnapshot {
        PriceSnapshot {
            btc_price_usd: usd,
            btc_price_eur: eur,
            price_change_percent_24h: 0.0,
        }
    }

    #[test]
    fn test_grouped_sats_convert() {
        let conversion = convert_sats("100,000", Some(&price(50_000.0, 45_000.0)));
        assert_eq!(conversion.usd, "50.00");
        assert_eq!(conversion.eur, "45.00");
    }

    #[test]
    fn test_empty_and_garbage_clear_outputs() {
        let p = price(50_000.0, 45_000.0);
        assert!(convert_sats("", Some(&p)).is_empty());
        assert!(convert_sats("abc", Some(&p)).is_empty());
        assert!(convert_sats(" , ", Some(&p)).is_empty());
    }

    #[test]
    fn test_parse_sats_errors() {
        assert_eq!(parse_sats(" 1,000,000 ").unwrap(), 1_000_000.0);
        assert!(matches!(parse_sats(""), Err(SyncError::Parse(_))));
        assert!(matches!(parse_sats("12abc"), Err(SyncError::Parse(_))));
        assert!(matches!(parse_sats("inf"), Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_zero_converts_to_zero_not_empty() {
        let conversion = convert_sats("0", Some(&price(50_000.0, 45_000.0)));
        assert_eq!(conversion.usd, "0.00");
    }

    #[test]
    fn test_missing_price_clears_outputs() {
        assert!(convert_sats("100000", None).is_empty());
        assert!(convert_sats("100000", Some(&price(0.0, 0.0))).is_empty());
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let p = price(64_123.45, 59_876.5);
        assert_eq!(convert_sats("2,500", Some(&p)), convert_sats("2,500", Some(&p)));
    }

    #[test]
    fn test_small_amounts_keep_up_to_eight_digits() {
        // 1 sat at $50,000
        assert_eq!(convert_sats("1", Some(&price(50_000.0, 1.0))).usd, "0.0005");
    }

    #[test]
    fn test_format_number_grouping() {
        assert_eq!(format_number(1_234_567.891, 2, 2), "1,234,567.89");
        assert_eq!(format_number(999.0, 2, 8), "999.00");
        assert_eq!(format_number(1000.0, 2, 8), "1,000.00");
        assert_eq!(format_number(-1234.5, 2, 8), "-1,234.50");
        assert_eq!(format_number(0.12345678, 8, 8), "0.12345678");
        assert_eq!(format_number(f64::NAN, 2, 8), "0");
    }
}
