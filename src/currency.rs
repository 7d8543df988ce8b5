//! Display-side currency conversion
//!
//! Prices are stored in the base currency; conversion happens only when a
//! price is rendered. Nothing converted is ever written back.

use rust_decimal::Decimal;

pub trait CurrencyConverter: Send + Sync {
    /// Convert a base-currency amount into the active currency.
    fn convert(&self, amount: Decimal) -> Decimal;

    /// Symbol of the active currency.
    fn symbol(&self) -> &str;
}

/// Fixed-rate converter configured at startup.
pub struct FixedRateCurrency {
    rate: Decimal,
    symbol: String,
}

impl FixedRateCurrency {
    pub fn new(rate: Decimal, symbol: impl Into<String>) -> Self {
        Self {
            rate,
            symbol: symbol.into(),
        }
    }

    /// Identity conversion in the base currency.
    pub fn base(symbol: impl Into<String>) -> Self {
        Self::new(Decimal::ONE, symbol)
    }
}

impl CurrencyConverter for FixedRateCurrency {
    fn convert(&self, amount: Decimal) -> Decimal {
        amount * self.rate
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Two-decimal display form.
pub fn format_amount(amount: Decimal) -> String {
    format!("{amount:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_two_decimals() {
        assert_eq!(format_amount(Decimal::from(121)), "121.00");
        assert_eq!(format_amount(Decimal::new(1999, 2)), "19.99");
    }

    #[test]
    fn test_fixed_rate_conversion() {
        let eur = FixedRateCurrency::new(Decimal::new(9, 1), "€"); // 0.9
        assert_eq!(eur.convert(Decimal::from(100)), Decimal::from(90));
        assert_eq!(eur.symbol(), "€");
    }
}
