//! Basket Lines

use rusty_money::{Money, iso::Currency};

use crate::{
    basket::BasketError,
    discounts::line_minor,
    products::{ProductClassKey, ProductKey},
};

/// A basket line: one product, its unit price and how many units have been used by offers.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    product: ProductKey,
    product_class: Option<ProductClassKey>,
    unit_price: Money<'a, Currency>,
    quantity: u32,
    consumed: u32,
    discount: Money<'a, Currency>,
}

impl<'a> Line<'a> {
    /// Create a new line with nothing consumed or discounted.
    pub fn new(
        product: ProductKey,
        product_class: Option<ProductClassKey>,
        unit_price: Money<'a, Currency>,
        quantity: u32,
    ) -> Self {
        Self {
            product,
            product_class,
            unit_price,
            quantity,
            consumed: 0,
            discount: Money::from_minor(0, unit_price.currency()),
        }
    }

    /// Product on this line
    pub fn product(&self) -> ProductKey {
        self.product
    }

    /// Class of the product on this line
    pub fn product_class(&self) -> Option<ProductClassKey> {
        self.product_class
    }

    /// Price of a single unit
    pub fn unit_price(&self) -> Money<'a, Currency> {
        self.unit_price
    }

    /// Total units on the line
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Units already used by a condition or benefit
    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Units still available to offers.
    pub fn quantity_without_discount(&self) -> u32 {
        self.quantity.saturating_sub(self.consumed)
    }

    /// Total discount granted on this line.
    pub fn discount_total(&self) -> Money<'a, Currency> {
        self.discount
    }

    /// Mark up to `quantity` further units as used. Returns the number of units actually consumed.
    pub fn consume(&mut self, quantity: u32) -> u32 {
        let quantity = quantity.min(self.quantity_without_discount());

        self.consumed += quantity;

        quantity
    }

    /// Record a discount of `amount` across `quantity` units, consuming them.
    ///
    /// # Errors
    ///
    /// Returns a [`BasketError`] if the amount is in another currency or the total overflows.
    pub fn discount(
        &mut self,
        amount: Money<'a, Currency>,
        quantity: u32,
    ) -> Result<u32, BasketError> {
        self.discount = self.discount.add(amount)?;

        Ok(self.consume(quantity))
    }

    /// Undo every consumption and discount on the line.
    pub fn reset(&mut self) {
        self.consumed = 0;
        self.discount = Money::from_minor(0, self.unit_price.currency());
    }

    pub(crate) fn add_quantity(&mut self, quantity: u32) -> Result<(), BasketError> {
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or(BasketError::Overflow)?;

        Ok(())
    }

    /// Line price before discounts.
    ///
    /// # Errors
    ///
    /// Returns [`BasketError::Overflow`] if the price does not fit in minor units.
    pub fn line_price(&self) -> Result<Money<'a, Currency>, BasketError> {
        let minor = line_minor(self.unit_price.to_minor_units(), self.quantity)
            .map_err(|_err| BasketError::Overflow)?;

        Ok(Money::from_minor(minor, self.unit_price.currency()))
    }

    /// Line price after discounts.
    ///
    /// # Errors
    ///
    /// Returns a [`BasketError`] if the line price overflows.
    pub fn line_price_after_discounts(&self) -> Result<Money<'a, Currency>, BasketError> {
        Ok(self.line_price()?.sub(self.discount)?)
    }
}
