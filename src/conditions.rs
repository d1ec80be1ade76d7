//! Conditions
//!
//! A condition decides whether a basket is eligible for an offer, and which units are
//! used up ("consumed") once the offer has been applied.

use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    basket::Basket,
    discounts::{DiscountError, line_minor, units_to_cover},
    ranges::Range,
};

/// Errors raised while consuming basket items for a condition.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The condition threshold is in a different currency to the basket.
    #[error("Condition has currency {0}, but basket has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped minor unit arithmetic error.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// Threshold a basket must reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConditionKind<'a> {
    /// At least this many in-range units.
    Count(u32),

    /// In-range units worth at least this amount.
    Value(Money<'a, Currency>),

    /// At least this many distinct in-range products.
    Coverage(u32),
}

/// A predicate over basket contents, restricted to a range of products.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<'a> {
    range: Range,
    kind: ConditionKind<'a>,
}

impl<'a> Condition<'a> {
    /// Create a new condition.
    pub fn new(range: Range, kind: ConditionKind<'a>) -> Self {
        Self { range, kind }
    }

    /// Condition satisfied by `count` in-range units.
    pub fn count(range: Range, count: u32) -> Self {
        Self::new(range, ConditionKind::Count(count))
    }

    /// Condition satisfied by in-range units worth at least `value`.
    pub fn value(range: Range, value: Money<'a, Currency>) -> Self {
        Self::new(range, ConditionKind::Value(value))
    }

    /// Condition satisfied by `count` distinct in-range products.
    pub fn coverage(range: Range, count: u32) -> Self {
        Self::new(range, ConditionKind::Coverage(count))
    }

    /// Range this condition looks at
    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Condition threshold
    pub fn kind(&self) -> &ConditionKind<'a> {
        &self.kind
    }

    /// Returns whether the unconsumed units in the basket satisfy this condition.
    pub fn is_satisfied(&self, basket: &Basket<'_>) -> bool {
        if basket.is_empty() {
            return false;
        }

        match self.kind {
            ConditionKind::Count(count) => self.available_units(basket) >= u64::from(count),
            ConditionKind::Value(value) => {
                if value.currency() != basket.currency() {
                    return false;
                }

                self.available_value(basket) >= i128::from(value.to_minor_units())
            }
            ConditionKind::Coverage(count) => {
                self.covered_products(basket) >= usize::try_from(count).unwrap_or(usize::MAX)
            }
        }
    }

    /// Mark the basket units that satisfy this condition as used.
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if a value threshold is in another currency or the
    /// consumed value overflows.
    pub fn consume_items(&self, basket: &mut Basket<'_>) -> Result<(), ConditionError> {
        match self.kind {
            ConditionKind::Count(count) => {
                let mut remaining = count;

                for line in basket.lines_mut() {
                    if remaining == 0 {
                        break;
                    }

                    if self.range.contains_line(line) {
                        remaining -= line.consume(remaining);
                    }
                }
            }
            ConditionKind::Value(value) => {
                if value.currency() != basket.currency() {
                    return Err(ConditionError::CurrencyMismatch(
                        value.currency().iso_alpha_code,
                        basket.currency().iso_alpha_code,
                    ));
                }

                let threshold = value.to_minor_units();
                let mut matched = 0i64;

                for line in basket.lines_mut() {
                    if matched >= threshold {
                        break;
                    }

                    let price = line.unit_price().to_minor_units();

                    if !self.range.contains_line(line) || price <= 0 {
                        continue;
                    }

                    let wanted = units_to_cover(threshold - matched, price);
                    let consumed = line.consume(wanted);

                    matched = matched
                        .checked_add(line_minor(price, consumed)?)
                        .ok_or(DiscountError::Overflow)?;
                }
            }
            ConditionKind::Coverage(count) => {
                let wanted = usize::try_from(count).unwrap_or(usize::MAX);
                let mut covered = FxHashSet::default();

                for line in basket.lines_mut() {
                    if covered.len() >= wanted {
                        break;
                    }

                    if !self.range.contains_line(line) || covered.contains(&line.product()) {
                        continue;
                    }

                    if line.consume(1) == 1 {
                        covered.insert(line.product());
                    }
                }
            }
        }

        Ok(())
    }

    fn available_units(&self, basket: &Basket<'_>) -> u64 {
        basket
            .all_lines()
            .iter()
            .filter(|line| self.range.contains_line(line))
            .map(|line| u64::from(line.quantity_without_discount()))
            .sum()
    }

    fn available_value(&self, basket: &Basket<'_>) -> i128 {
        basket
            .all_lines()
            .iter()
            .filter(|line| self.range.contains_line(line))
            .map(|line| {
                i128::from(line.unit_price().to_minor_units())
                    * i128::from(line.quantity_without_discount())
            })
            .sum()
    }

    fn covered_products(&self, basket: &Basket<'_>) -> usize {
        basket
            .all_lines()
            .iter()
            .filter(|line| line.quantity_without_discount() > 0 && self.range.contains_line(line))
            .map(|line| line.product())
            .collect::<FxHashSet<_>>()
            .len()
    }
}
