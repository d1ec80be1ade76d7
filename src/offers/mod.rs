//! Offers
//!
//! A conditional offer pairs a [`Condition`] with a [`Benefit`] and is only available
//! between its start and end dates.

use jiff::civil::Date;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::Deserialize;
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::{
    basket::{Basket, BasketError},
    benefits::{Benefit, BenefitError, BenefitKind},
    conditions::{Condition, ConditionError, ConditionKind},
};

pub mod applicator;

new_key_type! {
    /// Offer Key
    pub struct OfferKey;
}

/// All known offers, keyed by [`OfferKey`].
pub type OfferSet<'a> = SlotMap<OfferKey, ConditionalOffer<'a>>;

/// Errors raised by offers.
#[derive(Debug, Error)]
pub enum OfferError {
    /// The offer ends before it starts.
    #[error("End date {end} should be later than start date {start}")]
    InvalidDateRange {
        /// Start of the validity window
        start: Date,

        /// End of the validity window
        end: Date,
    },

    /// The benefit cannot be paired with the condition kind.
    #[error("Fixed price benefits require a count or coverage condition")]
    UnsupportedCondition,

    /// An offer key did not resolve to an offer.
    #[error("Offer not found")]
    OfferNotFound,

    /// Wrapped basket error.
    #[error(transparent)]
    Basket(#[from] BasketError),

    /// Wrapped condition error.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// Wrapped benefit error.
    #[error(transparent)]
    Benefit(#[from] BenefitError),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Who an offer is available to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    /// Applied to every basket.
    #[default]
    Site,

    /// Only applied through a voucher.
    Voucher,

    /// Targeted at specific users.
    User,

    /// Available for the current session only.
    Session,
}

/// A conditional offer
#[derive(Debug, Clone)]
pub struct ConditionalOffer<'a> {
    name: String,
    description: String,
    offer_type: OfferType,
    condition: Condition<'a>,
    benefit: Benefit<'a>,
    start_date: Date,
    end_date: Date,
    priority: i32,
    total_discount: Option<Money<'a, Currency>>,
    num_orders: u64,
}

impl<'a> ConditionalOffer<'a> {
    /// Create a new site offer valid between `start_date` (inclusive) and `end_date`
    /// (exclusive).
    pub fn new(
        name: impl Into<String>,
        condition: Condition<'a>,
        benefit: Benefit<'a>,
        start_date: Date,
        end_date: Date,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            offer_type: OfferType::Site,
            condition,
            benefit,
            start_date,
            end_date,
            priority: 0,
            total_discount: None,
            num_orders: 0,
        }
    }

    /// Set the offer description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the offer type.
    #[must_use]
    pub fn with_offer_type(mut self, offer_type: OfferType) -> Self {
        self.offer_type = offer_type;
        self
    }

    /// Set the priority. Higher priority site offers are applied first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Offer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offer description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Offer type
    pub fn offer_type(&self) -> OfferType {
        self.offer_type
    }

    /// Eligibility condition
    pub fn condition(&self) -> &Condition<'a> {
        &self.condition
    }

    /// Granted benefit
    pub fn benefit(&self) -> &Benefit<'a> {
        &self.benefit
    }

    /// First day the offer is active
    pub fn start_date(&self) -> Date {
        self.start_date
    }

    /// First day the offer is no longer active
    pub fn end_date(&self) -> Date {
        self.end_date
    }

    /// Offer priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Total discount granted across recorded orders, if any order has been recorded.
    pub fn total_discount(&self) -> Option<Money<'a, Currency>> {
        self.total_discount
    }

    /// Number of orders this offer has been applied to
    pub fn num_orders(&self) -> u64 {
        self.num_orders
    }

    /// Check the offer dates are consistent and the benefit can use the condition.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError::InvalidDateRange`] if the end date precedes the start date,
    /// or [`OfferError::UnsupportedCondition`] for a fixed price benefit behind a value
    /// condition.
    pub fn validate(&self) -> Result<(), OfferError> {
        if self.end_date < self.start_date {
            return Err(OfferError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        if matches!(self.benefit.kind(), BenefitKind::FixedPrice(_))
            && matches!(self.condition.kind(), ConditionKind::Value(_))
        {
            return Err(OfferError::UnsupportedCondition);
        }

        Ok(())
    }

    /// Returns whether the offer is active on `date`.
    pub fn is_active(&self, date: Date) -> bool {
        self.start_date <= date && date < self.end_date
    }

    /// Returns whether the basket currently satisfies the offer condition.
    pub fn is_condition_satisfied(&self, basket: &Basket<'_>) -> bool {
        self.condition.is_satisfied(basket)
    }

    /// Apply the offer once, returning the discount granted.
    ///
    /// Nothing is granted if the condition is not satisfied. Otherwise the benefit is
    /// applied and the units satisfying the condition are consumed.
    ///
    /// # Errors
    ///
    /// Returns an [`OfferError`] if the benefit or condition fails to apply.
    pub fn apply_benefit(
        &self,
        basket: &mut Basket<'a>,
    ) -> Result<Money<'a, Currency>, OfferError> {
        if !self.condition.is_satisfied(basket) {
            return Ok(basket.zero());
        }

        let discount = self.benefit.apply(basket, Some(&self.condition))?;

        self.condition.consume_items(basket)?;

        Ok(discount)
    }

    /// Record that an order was placed with this offer granting `discount`.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError::Money`] if `discount` is in a different currency to previously
    /// recorded discounts.
    pub fn record_usage(&mut self, discount: Money<'a, Currency>) -> Result<(), OfferError> {
        self.total_discount = Some(match self.total_discount {
            Some(total) => total.add(discount)?,
            None => discount,
        });

        self.num_orders += 1;

        Ok(())
    }
}
