use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::PaymentsError;

/// Largest scale `rust_decimal` can represent.
pub const MAX_DECIMALS: u32 = 28;

/// Parse a decimal string exactly, accepting plain (`"0.05"`) and scientific
/// (`"5e-2"`) notation. Surrounding whitespace is ignored.
pub fn parse_decimal(value: &str) -> Result<Decimal, PaymentsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PaymentsError::InvalidAmount("empty value".into()));
    }
    let parsed = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str(trimmed)
    };
    parsed.map_err(|e| PaymentsError::InvalidAmount(format!("{trimmed}: {e}")))
}

/// Parse an amount that is already in base units, rounding any fractional
/// part to the nearest integer.
pub fn parse_base_amount(value: &str) -> Result<u64, PaymentsError> {
    let parsed = parse_decimal(value)?;
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(PaymentsError::InvalidAmount(format!("negative value {parsed}")));
    }
    parsed
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(|| PaymentsError::Overflow(format!("{parsed} does not fit in base units")))
}

/// Converts between the human ("main") denomination of an asset and its
/// integer ("base") denomination, e.g. BTC and satoshis for `decimals = 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitConverter {
    decimals: u32,
    /// `10^decimals`, cached.
    multiplier: Decimal,
}

impl UnitConverter {
    pub fn new(decimals: u32) -> Result<Self, PaymentsError> {
        if decimals > MAX_DECIMALS {
            return Err(PaymentsError::UnsupportedDecimals(decimals));
        }
        Ok(Self {
            decimals,
            multiplier: Decimal::from_i128_with_scale(10i128.pow(decimals), 0),
        })
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Convert a main-denomination string to base units, rounding to the
    /// nearest integer (midpoint away from zero).
    pub fn to_base_denomination(&self, value: &str) -> Result<u64, PaymentsError> {
        self.decimal_to_base(parse_decimal(value)?)
    }

    /// Same as [`Self::to_base_denomination`] for an already parsed value.
    pub fn decimal_to_base(&self, value: Decimal) -> Result<u64, PaymentsError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PaymentsError::InvalidAmount(format!("negative value {value}")));
        }
        let scaled = value
            .checked_mul(self.multiplier)
            .ok_or_else(|| PaymentsError::Overflow(format!("{value} x 10^{}", self.decimals)))?;
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .ok_or_else(|| PaymentsError::Overflow(format!("{value} does not fit in base units")))
    }

    /// Base-denomination amount as a decimal string.
    pub fn to_base_denomination_string(&self, value: &str) -> Result<String, PaymentsError> {
        Ok(self.to_base_denomination(value)?.to_string())
    }

    /// Convert base units to the shortest exact main-denomination string.
    pub fn to_main_denomination(&self, base: u64) -> String {
        Decimal::from_i128_with_scale(i128::from(base), self.decimals)
            .normalize()
            .to_string()
    }

    /// Same as [`Self::to_main_denomination`] for a base amount given as a
    /// string, such as one returned by a block explorer.
    pub fn to_main_denomination_str(&self, base: &str) -> Result<String, PaymentsError> {
        let parsed = parse_decimal(base)?;
        if !parsed.fract().is_zero() {
            return Err(PaymentsError::InvalidAmount(format!(
                "fractional base amount {base}"
            )));
        }
        let base = parsed.to_u64().ok_or_else(|| {
            PaymentsError::InvalidAmount(format!("base amount {base} out of range"))
        })?;
        Ok(self.to_main_denomination(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> UnitConverter {
        UnitConverter::new(8).unwrap()
    }

    #[test]
    fn main_to_base_exact() {
        let units = btc();
        assert_eq!(units.to_base_denomination("0.05").unwrap(), 5_000_000);
        assert_eq!(units.to_base_denomination("1.999999").unwrap(), 199_999_900);
        assert_eq!(units.to_base_denomination("21000000").unwrap(), 2_100_000_000_000_000);
    }

    #[test]
    fn no_binary_float_drift() {
        // 0.29 * 1e8 is 28999999.999999996 in f64.
        assert_eq!(btc().to_base_denomination("0.29").unwrap(), 29_000_000);
        assert_eq!(btc().to_base_denomination("1.001").unwrap(), 100_100_000);
    }

    #[test]
    fn rounds_to_nearest_satoshi() {
        let units = btc();
        assert_eq!(units.to_base_denomination("0.000000005").unwrap(), 1);
        assert_eq!(units.to_base_denomination("0.000000004").unwrap(), 0);
        assert_eq!(units.to_base_denomination("0.0000000149").unwrap(), 1);
    }

    #[test]
    fn scientific_notation_accepted() {
        assert_eq!(btc().to_base_denomination("5e-2").unwrap(), 5_000_000);
        assert_eq!(btc().to_base_denomination("1E-8").unwrap(), 1);
    }

    #[test]
    fn negative_value_rejected() {
        let err = btc().to_base_denomination("-0.1").unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn garbage_rejected() {
        assert!(btc().to_base_denomination("abc").is_err());
        assert!(btc().to_base_denomination("").is_err());
        assert!(btc().to_base_denomination("NaN").is_err());
    }

    #[test]
    fn base_to_main_strips_trailing_zeros() {
        let units = btc();
        assert_eq!(units.to_main_denomination(4_900_000), "0.049");
        assert_eq!(units.to_main_denomination(100_000_000), "1");
        assert_eq!(units.to_main_denomination(100_100), "0.001001");
        assert_eq!(units.to_main_denomination(0), "0");
        assert_eq!(units.to_main_denomination(1), "0.00000001");
    }

    #[test]
    fn base_string_to_main() {
        let units = btc();
        assert_eq!(units.to_main_denomination_str("70000000").unwrap(), "0.7");
        assert!(units.to_main_denomination_str("1.5").is_err());
        assert!(units.to_main_denomination_str("-5").is_err());
    }

    #[test]
    fn base_string_output() {
        assert_eq!(btc().to_base_denomination_string("0.001").unwrap(), "100000");
    }

    #[test]
    fn base_amount_parsing() {
        assert_eq!(parse_base_amount("2500").unwrap(), 2500);
        assert_eq!(parse_base_amount("2500.5").unwrap(), 2501);
        assert!(parse_base_amount("-3").is_err());
    }

    #[test]
    fn zero_decimals() {
        let units = UnitConverter::new(0).unwrap();
        assert_eq!(units.to_base_denomination("12").unwrap(), 12);
        assert_eq!(units.to_base_denomination("12.5").unwrap(), 13);
        assert_eq!(units.to_main_denomination(12), "12");
    }

    #[test]
    fn too_many_decimals_rejected() {
        assert!(matches!(
            UnitConverter::new(29),
            Err(PaymentsError::UnsupportedDecimals(29))
        ));
    }

    #[test]
    fn overflow_reported() {
        let err = btc().to_base_denomination("1000000000000000").unwrap_err();
        assert!(matches!(err, PaymentsError::Overflow(_)));
    }
}
