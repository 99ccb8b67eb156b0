//! Display formatting for dashboard consumers

use crate::convert::format_number;
use crate::storage::Currency;

/// Placeholder shown instead of monetary values when they are hidden
pub const HIDDEN_VALUE: &str = "********";

/// Signed percentage with two decimals, e.g. `+1.23` or `-0.50`
pub fn format_percentage(value: f64) -> String {
    if value >= 0.0 {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// BTC amount: eight decimals below one coin, two otherwise
pub fn format_btc(value: f64, hide: bool) -> String {
    if hide {
        return HIDDEN_VALUE.to_string();
    }
    let min_fraction = if value < 1.0 { 8 } else { 2 };
    format_number(value, min_fraction, 8)
}

/// Fiat amount prefixed with the currency symbol
pub fn format_currency(value: f64, currency: Currency, hide: bool) -> String {
    let body = if hide {
        HIDDEN_VALUE.to_string()
    } else {
        format_number(value, 2, 8)
    };
    format!("{}{}", currency.symbol(), body)
}
