//! Discount utilities
//!
//! Minor-unit arithmetic shared by conditions and benefits.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use smallvec::SmallVec;
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Minor unit arithmetic overflowed.
    #[error("discount arithmetic overflowed")]
    Overflow,

    /// Apportioning was requested across weights that sum to zero.
    #[error("cannot apportion a discount across zero weight")]
    ZeroWeight,
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the result cannot be represented in minor units.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Number of units priced at `unit_minor` needed to cover `remaining_minor`, rounding up.
///
/// Returns zero when nothing remains or the unit is free.
pub fn units_to_cover(remaining_minor: i64, unit_minor: i64) -> u32 {
    if remaining_minor <= 0 || unit_minor <= 0 {
        return 0;
    }

    let units = (remaining_minor - 1) / unit_minor + 1;

    u32::try_from(units).unwrap_or(u32::MAX)
}

/// Total minor units for `quantity` units priced at `unit_minor`.
///
/// # Errors
///
/// Returns [`DiscountError::Overflow`] if the multiplication overflows.
pub fn line_minor(unit_minor: i64, quantity: u32) -> Result<i64, DiscountError> {
    unit_minor
        .checked_mul(i64::from(quantity))
        .ok_or(DiscountError::Overflow)
}

/// Split `total` minor units across `weights` proportionally.
///
/// Every share but the last is rounded half away from zero; the last share takes the
/// remainder so the shares always sum to `total`.
///
/// # Errors
///
/// Returns an error if the weights sum to zero or the arithmetic overflows.
pub fn apportion_minor(total: i64, weights: &[i64]) -> Result<SmallVec<[i64; 4]>, DiscountError> {
    let weight_sum = weights
        .iter()
        .try_fold(0i64, |acc, weight| acc.checked_add(*weight))
        .ok_or(DiscountError::Overflow)?;

    if weight_sum == 0 {
        return Err(DiscountError::ZeroWeight);
    }

    let total_dec = Decimal::from_i64(total).ok_or(DiscountError::Overflow)?;
    let sum_dec = Decimal::from_i64(weight_sum).ok_or(DiscountError::Overflow)?;

    let mut shares = SmallVec::with_capacity(weights.len());
    let mut allocated = 0i64;

    for (idx, weight) in weights.iter().enumerate() {
        let share = if idx + 1 == weights.len() {
            total.checked_sub(allocated).ok_or(DiscountError::Overflow)?
        } else {
            let weight_dec = Decimal::from_i64(*weight).ok_or(DiscountError::Overflow)?;

            total_dec
                .checked_mul(weight_dec)
                .and_then(|value| value.checked_div(sum_dec))
                .ok_or(DiscountError::Overflow)?
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .ok_or(DiscountError::Overflow)?
        };

        allocated = allocated.checked_add(share).ok_or(DiscountError::Overflow)?;
        shares.push(share);
    }

    Ok(shares)
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use decimal_percentage::Percentage;
    use smallvec::smallvec;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn percent_of_minor_calculates_correctly() -> TestResult {
        let percent = Percentage::from(0.15);

        assert_eq!(percent_of_minor(&percent, 1500)?, 225);

        Ok(())
    }

    #[test]
    fn percent_of_minor_rounds_half_away_from_zero() -> TestResult {
        let percent = Percentage::from(0.5);

        assert_eq!(percent_of_minor(&percent, 5)?, 3);

        Ok(())
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() {
        let percent = Percentage::from(2.0);
        let result = percent_of_minor(&percent, i64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));
    }

    #[test]
    fn percent_of_minor_checked_mul_overflow_returns_error() -> TestResult {
        let percent = Percentage::try_from("100000000000000000000")?;
        let result = percent_of_minor(&percent, i64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));

        Ok(())
    }

    #[test]
    fn units_to_cover_rounds_up() {
        assert_eq!(units_to_cover(1000, 500), 2);
        assert_eq!(units_to_cover(1001, 500), 3);
        assert_eq!(units_to_cover(1, 500), 1);
    }

    #[test]
    fn units_to_cover_is_zero_for_nothing_remaining_or_free_units() {
        assert_eq!(units_to_cover(0, 500), 0);
        assert_eq!(units_to_cover(-10, 500), 0);
        assert_eq!(units_to_cover(100, 0), 0);
    }

    #[test]
    fn line_minor_overflow_returns_error() {
        assert_eq!(line_minor(i64::MAX, 2), Err(DiscountError::Overflow));
    }

    #[test]
    fn apportion_minor_splits_proportionally() -> TestResult {
        let shares = apportion_minor(200, &[800, 400])?;

        let expected: SmallVec<[i64; 4]> = smallvec![133, 67];
        assert_eq!(shares, expected);

        Ok(())
    }

    #[test]
    fn apportion_minor_shares_sum_to_total() -> TestResult {
        let shares = apportion_minor(100, &[1, 1, 1])?;

        assert_eq!(shares.iter().sum::<i64>(), 100);

        let expected: SmallVec<[i64; 4]> = smallvec![33, 33, 34];
        assert_eq!(shares, expected);

        Ok(())
    }

    #[test]
    fn apportion_minor_rejects_zero_weights() {
        assert_eq!(apportion_minor(100, &[0, 0]), Err(DiscountError::ZeroWeight));
    }
}
