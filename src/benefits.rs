//! Benefits
//!
//! A benefit calculates the discount granted once an offer's condition is satisfied, and
//! records it against the basket lines it affects. Discounted units are consumed, so a
//! benefit applied twice never discounts the same unit twice.

use decimal_percentage::Percentage;
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    basket::{Basket, BasketError},
    conditions::{Condition, ConditionKind},
    discounts::{DiscountError, apportion_minor, line_minor, percent_of_minor, units_to_cover},
    ranges::Range,
};

/// Errors that can occur while applying a benefit.
#[derive(Debug, Error)]
pub enum BenefitError {
    /// Fixed price benefits need the condition that selected the covered items.
    #[error("fixed price benefit requires a condition")]
    MissingCondition,

    /// Fixed price benefits only work with count or coverage conditions.
    #[error("fixed price benefit requires a count or coverage condition")]
    UnsupportedCondition,

    /// The benefit amount is in a different currency to the basket.
    #[error("Benefit has currency {0}, but basket has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped minor unit arithmetic error.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Wrapped basket error.
    #[error(transparent)]
    Basket(#[from] BasketError),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Discount calculation strategy.
#[derive(Debug, Clone, Copy)]
pub enum BenefitKind<'a> {
    /// Percentage off every affected unit (e.g. "15% off").
    Percentage(Percentage),

    /// A fixed amount off, spread across affected units (e.g. "£10 off").
    Absolute(Money<'a, Currency>),

    /// The cheapest affected unit is free.
    Multibuy,

    /// The units selected by the condition cost this much in total.
    FixedPrice(Money<'a, Currency>),
}

/// Discount strategy restricted to a range of products.
#[derive(Debug, Clone)]
pub struct Benefit<'a> {
    range: Range,
    kind: BenefitKind<'a>,
    max_affected_items: Option<u32>,
}

impl<'a> Benefit<'a> {
    /// Create a new benefit affecting an unlimited number of units.
    pub fn new(range: Range, kind: BenefitKind<'a>) -> Self {
        Self {
            range,
            kind,
            max_affected_items: None,
        }
    }

    /// Percentage discount benefit.
    pub fn percentage(range: Range, percent: Percentage) -> Self {
        Self::new(range, BenefitKind::Percentage(percent))
    }

    /// Absolute discount benefit.
    pub fn absolute(range: Range, amount: Money<'a, Currency>) -> Self {
        Self::new(range, BenefitKind::Absolute(amount))
    }

    /// Multibuy benefit: one free unit per application.
    pub fn multibuy(range: Range) -> Self {
        Self::new(range, BenefitKind::Multibuy)
    }

    /// Fixed price benefit.
    pub fn fixed_price(range: Range, price: Money<'a, Currency>) -> Self {
        Self::new(range, BenefitKind::FixedPrice(price))
    }

    /// Cap the number of units a single application may discount.
    #[must_use]
    pub fn with_max_affected_items(mut self, max: u32) -> Self {
        self.max_affected_items = Some(max);
        self
    }

    /// Set or clear the cap on affected units.
    pub fn set_max_affected_items(&mut self, max: Option<u32>) {
        self.max_affected_items = max;
    }

    /// Range of products this benefit discounts
    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Discount strategy
    pub fn kind(&self) -> &BenefitKind<'a> {
        &self.kind
    }

    /// Cap on units discounted per application
    pub fn max_affected_items(&self) -> Option<u32> {
        self.max_affected_items
    }

    /// Apply the benefit to the basket, returning the discount granted.
    ///
    /// `condition` is only used by fixed price benefits, which discount the units the
    /// condition selects.
    ///
    /// # Errors
    ///
    /// Returns a [`BenefitError`] if the benefit is misconfigured, in the wrong currency,
    /// or the discount arithmetic overflows.
    pub fn apply(
        &self,
        basket: &mut Basket<'a>,
        condition: Option<&Condition<'a>>,
    ) -> Result<Money<'a, Currency>, BenefitError> {
        let currency = basket.currency();

        let discount_minor = match self.kind {
            BenefitKind::Percentage(percent) => self.apply_percentage(basket, &percent)?,
            BenefitKind::Absolute(amount) => {
                ensure_currency(amount, currency)?;
                self.apply_absolute(basket, amount.to_minor_units())?
            }
            BenefitKind::Multibuy => self.apply_multibuy(basket)?,
            BenefitKind::FixedPrice(price) => {
                ensure_currency(price, currency)?;
                let condition = condition.ok_or(BenefitError::MissingCondition)?;

                apply_fixed_price(basket, condition, price.to_minor_units())?
            }
        };

        Ok(Money::from_minor(discount_minor, currency))
    }

    fn max_units(&self) -> u32 {
        self.max_affected_items.unwrap_or(u32::MAX)
    }

    fn apply_percentage(
        &self,
        basket: &mut Basket<'a>,
        percent: &Percentage,
    ) -> Result<i64, BenefitError> {
        let currency = basket.currency();
        let max_units = self.max_units();
        let mut affected = 0u32;
        let mut discount = 0i64;

        for line in basket.lines_mut() {
            if affected >= max_units {
                break;
            }

            if !self.range.contains_line(line) || line.quantity_without_discount() == 0 {
                continue;
            }

            let quantity = line.quantity_without_discount().min(max_units - affected);
            let line_discount = percent_of_minor(
                percent,
                line_minor(line.unit_price().to_minor_units(), quantity)?,
            )?;

            line.discount(Money::from_minor(line_discount, currency), quantity)?;

            affected += quantity;
            discount = discount
                .checked_add(line_discount)
                .ok_or(DiscountError::Overflow)?;
        }

        Ok(discount)
    }

    fn apply_absolute(&self, basket: &mut Basket<'a>, value: i64) -> Result<i64, BenefitError> {
        let currency = basket.currency();
        let max_units = self.max_units();
        let mut affected = 0u32;
        let mut discount = 0i64;

        for line in basket.lines_mut() {
            if affected >= max_units || discount >= value {
                break;
            }

            let price = line.unit_price().to_minor_units();

            if price <= 0
                || line.quantity_without_discount() == 0
                || !self.range.contains_line(line)
            {
                continue;
            }

            let remaining = value - discount;
            let quantity = line
                .quantity_without_discount()
                .min(max_units - affected)
                .min(units_to_cover(remaining, price));

            let line_discount = remaining.min(line_minor(price, quantity)?);

            line.discount(Money::from_minor(line_discount, currency), quantity)?;

            affected += quantity;
            discount += line_discount;
        }

        Ok(discount)
    }

    fn apply_multibuy(&self, basket: &mut Basket<'a>) -> Result<i64, BenefitError> {
        let currency = basket.currency();

        let cheapest = basket
            .lines_mut()
            .iter_mut()
            .filter(|line| line.quantity_without_discount() > 0 && self.range.contains_line(line))
            .min_by_key(|line| line.unit_price().to_minor_units());

        let Some(line) = cheapest else {
            return Ok(0);
        };

        let price = line.unit_price().to_minor_units();

        line.discount(Money::from_minor(price, currency), 1)?;

        Ok(price)
    }
}

/// Discount the units selected by `condition` down to `fixed_price` in total.
fn apply_fixed_price(
    basket: &mut Basket<'_>,
    condition: &Condition<'_>,
    fixed_price: i64,
) -> Result<i64, BenefitError> {
    let permitted = match condition.kind() {
        ConditionKind::Count(count) | ConditionKind::Coverage(count) => *count,
        ConditionKind::Value(_) => return Err(BenefitError::UnsupportedCondition),
    };

    let currency = basket.currency();
    let mut covered: SmallVec<[(usize, u32, i64); 4]> = SmallVec::new();
    let mut num_covered = 0u32;
    let mut product_total = 0i64;

    for (idx, line) in basket.all_lines().iter().enumerate() {
        if num_covered >= permitted {
            break;
        }

        if !condition.range().contains_line(line) || line.quantity_without_discount() == 0 {
            continue;
        }

        let quantity = line.quantity_without_discount().min(permitted - num_covered);
        let value = line_minor(line.unit_price().to_minor_units(), quantity)?;

        covered.push((idx, quantity, value));
        num_covered += quantity;
        product_total = product_total
            .checked_add(value)
            .ok_or(DiscountError::Overflow)?;
    }

    let discount = product_total.saturating_sub(fixed_price).max(0);

    if discount == 0 {
        return Ok(0);
    }

    let weights: SmallVec<[i64; 4]> = covered.iter().map(|(_, _, value)| *value).collect();
    let shares = apportion_minor(discount, &weights)?;

    for ((idx, quantity, _), share) in covered.iter().zip(shares) {
        let line = basket
            .lines_mut()
            .get_mut(*idx)
            .ok_or(BasketError::LineNotFound(*idx))?;

        line.discount(Money::from_minor(share, currency), *quantity)?;
    }

    Ok(discount)
}

fn ensure_currency(
    amount: Money<'_, Currency>,
    currency: &'static Currency,
) -> Result<(), BenefitError> {
    if amount.currency() == currency {
        Ok(())
    } else {
        Err(BenefitError::CurrencyMismatch(
            amount.currency().iso_alpha_code,
            currency.iso_alpha_code,
        ))
    }
}
