//! Basket

use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    offers::applicator::OfferDiscount,
    products::{Product, ProductKey},
    vouchers::VoucherKey,
};

mod line;

pub use line::Line;

/// Errors related to basket construction or totals.
#[derive(Debug, Error)]
pub enum BasketError {
    /// A product's currency differs from the basket currency (product currency, basket currency).
    #[error("Product has currency {0}, but basket has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// The product has no price and cannot be added.
    #[error("Product {0} has no price")]
    MissingPrice(String),

    /// Products must be added with a positive quantity.
    #[error("Quantity must be at least 1")]
    ZeroQuantity,

    /// A line was not found in the basket.
    #[error("Line {0} not found")]
    LineNotFound(usize),

    /// Minor unit arithmetic overflowed.
    #[error("Basket arithmetic overflowed")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Basket
#[derive(Debug, Clone)]
pub struct Basket<'a> {
    lines: Vec<Line<'a>>,
    currency: &'static Currency,
    vouchers: SmallVec<[VoucherKey; 2]>,
    discounts: Vec<OfferDiscount<'a>>,
}

impl<'a> Basket<'a> {
    /// Create a new empty basket in the given currency.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Basket {
            lines: Vec::new(),
            currency,
            vouchers: SmallVec::new(),
            discounts: Vec::new(),
        }
    }

    /// Add `quantity` units of a product. Adding a product already in the basket grows its line.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError` if the quantity is zero, the product has no price, the
    /// product is priced in another currency or the line quantity overflows.
    pub fn add_product(
        &mut self,
        key: ProductKey,
        product: &Product<'a>,
        quantity: u32,
    ) -> Result<(), BasketError> {
        if quantity == 0 {
            return Err(BasketError::ZeroQuantity);
        }

        let price = product
            .price
            .ok_or_else(|| BasketError::MissingPrice(product.name.clone()))?;

        if price.currency() != self.currency {
            return Err(BasketError::CurrencyMismatch(
                price.currency().iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        if let Some(line) = self.lines.iter_mut().find(|line| line.product() == key) {
            return line.add_quantity(quantity);
        }

        self.lines
            .push(Line::new(key, product.product_class, price, quantity));

        Ok(())
    }

    /// Get a line from the basket.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError::LineNotFound` if the line is not found.
    pub fn line(&self, idx: usize) -> Result<&Line<'a>, BasketError> {
        self.lines.get(idx).ok_or(BasketError::LineNotFound(idx))
    }

    /// All lines, in the order products were first added.
    pub fn all_lines(&self) -> &[Line<'a>] {
        &self.lines
    }

    pub(crate) fn lines_mut(&mut self) -> &mut [Line<'a>] {
        &mut self.lines
    }

    /// Number of lines in the basket.
    #[must_use]
    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn num_items(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity())).sum()
    }

    /// Units not yet used by any offer.
    #[must_use]
    pub fn num_items_without_discount(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity_without_discount()))
            .sum()
    }

    /// Check if the basket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get the currency of the basket.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// A zero amount in the basket currency.
    #[must_use]
    pub fn zero(&self) -> Money<'a, Currency> {
        Money::from_minor(0, self.currency)
    }

    /// Total of all lines before discounts.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError` if there was a money arithmetic error.
    pub fn subtotal(&self) -> Result<Money<'a, Currency>, BasketError> {
        self.lines
            .iter()
            .try_fold(self.zero(), |acc, line| -> Result<_, BasketError> {
                Ok(acc.add(line.line_price()?)?)
            })
    }

    /// Total discount granted by offers across all lines.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError` if there was a money arithmetic error.
    pub fn total_discount(&self) -> Result<Money<'a, Currency>, BasketError> {
        self.lines
            .iter()
            .try_fold(self.zero(), |acc, line| -> Result<_, BasketError> {
                Ok(acc.add(line.discount_total())?)
            })
    }

    /// Total payable after discounts.
    ///
    /// # Errors
    ///
    /// Returns a `BasketError` if there was a money arithmetic error.
    pub fn total(&self) -> Result<Money<'a, Currency>, BasketError> {
        Ok(self.subtotal()?.sub(self.total_discount()?)?)
    }

    /// Attach a voucher to the basket. Attaching the same voucher twice has no effect.
    pub fn add_voucher(&mut self, voucher: VoucherKey) -> bool {
        if self.vouchers.contains(&voucher) {
            return false;
        }

        self.vouchers.push(voucher);

        true
    }

    /// Vouchers attached to the basket.
    pub fn vouchers(&self) -> &[VoucherKey] {
        &self.vouchers
    }

    /// Record the offer discounts applied to this basket.
    pub fn set_discounts(&mut self, discounts: Vec<OfferDiscount<'a>>) {
        self.discounts = discounts;
    }

    /// Offer discounts applied to this basket, largest first.
    pub fn discounts(&self) -> &[OfferDiscount<'a>] {
        &self.discounts
    }

    /// Clear every consumption, line discount and applied offer summary.
    pub fn reset_offer_applications(&mut self) {
        self.lines.iter_mut().for_each(Line::reset);
        self.discounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::products::Catalogue;

    use super::*;

    fn catalogue() -> (Catalogue<'static>, ProductKey, ProductKey) {
        let mut catalogue = Catalogue::with_key();

        let mug = catalogue.insert(Product::new("Mug", Money::from_minor(500, GBP)));
        let pen = catalogue.insert(Product::new("Pen", Money::from_minor(120, GBP)));

        (catalogue, mug, pen)
    }

    #[test]
    fn new_basket_is_empty() -> TestResult {
        let basket = Basket::new(GBP);

        assert!(basket.is_empty());
        assert_eq!(basket.currency(), GBP);
        assert_eq!(basket.subtotal()?, Money::from_minor(0, GBP));

        Ok(())
    }

    #[test]
    fn add_product_merges_lines_for_the_same_product() -> TestResult {
        let (catalogue, mug, pen) = catalogue();
        let mut basket = Basket::new(GBP);

        basket.add_product(mug, &catalogue[mug], 1)?;
        basket.add_product(pen, &catalogue[pen], 2)?;
        basket.add_product(mug, &catalogue[mug], 2)?;

        assert_eq!(basket.num_lines(), 2);
        assert_eq!(basket.num_items(), 5);
        assert_eq!(basket.line(0)?.quantity(), 3);
        assert_eq!(basket.subtotal()?, Money::from_minor(1740, GBP));

        Ok(())
    }

    #[test]
    fn add_product_rejects_zero_quantity() {
        let (catalogue, mug, _) = catalogue();
        let mut basket = Basket::new(GBP);

        let result = basket.add_product(mug, &catalogue[mug], 0);

        assert!(matches!(result, Err(BasketError::ZeroQuantity)));
    }

    #[test]
    fn add_product_rejects_unpriced_products() {
        let mut catalogue = Catalogue::with_key();
        let key = catalogue.insert(Product::unpriced("Gift wrap"));
        let mut basket = Basket::new(GBP);

        let result = basket.add_product(key, &catalogue[key], 1);

        assert!(matches!(result, Err(BasketError::MissingPrice(name)) if name == "Gift wrap"));
    }

    #[test]
    fn add_product_rejects_currency_mismatch() {
        let (catalogue, mug, _) = catalogue();
        let mut basket = Basket::new(USD);

        match basket.add_product(mug, &catalogue[mug], 1) {
            Err(BasketError::CurrencyMismatch(product, basket)) => {
                assert_eq!(product, GBP.iso_alpha_code);
                assert_eq!(basket, USD.iso_alpha_code);
            }
            other => panic!("expected CurrencyMismatch error, got {other:?}"),
        }
    }

    #[test]
    fn line_missing_returns_error() {
        let basket = Basket::new(GBP);

        assert!(matches!(basket.line(0), Err(BasketError::LineNotFound(0))));
    }

    #[test]
    fn totals_reflect_line_discounts() -> TestResult {
        let (catalogue, mug, _) = catalogue();
        let mut basket = Basket::new(GBP);

        basket.add_product(mug, &catalogue[mug], 3)?;

        if let Some(line) = basket.lines_mut().first_mut() {
            line.discount(Money::from_minor(500, GBP), 1)?;
        }

        assert_eq!(basket.subtotal()?, Money::from_minor(1500, GBP));
        assert_eq!(basket.total_discount()?, Money::from_minor(500, GBP));
        assert_eq!(basket.total()?, Money::from_minor(1000, GBP));
        assert_eq!(basket.num_items_without_discount(), 2);

        Ok(())
    }

    #[test]
    fn reset_offer_applications_restores_availability() -> TestResult {
        let (catalogue, mug, _) = catalogue();
        let mut basket = Basket::new(GBP);

        basket.add_product(mug, &catalogue[mug], 2)?;

        if let Some(line) = basket.lines_mut().first_mut() {
            line.discount(Money::from_minor(100, GBP), 2)?;
        }

        basket.reset_offer_applications();

        assert_eq!(basket.num_items_without_discount(), 2);
        assert_eq!(basket.total()?, Money::from_minor(1000, GBP));
        assert!(basket.discounts().is_empty());

        Ok(())
    }

    #[test]
    fn add_voucher_ignores_duplicates() {
        let mut basket = Basket::new(GBP);
        let voucher = VoucherKey::default();

        assert!(basket.add_voucher(voucher));
        assert!(!basket.add_voucher(voucher));
        assert_eq!(basket.vouchers(), &[voucher]);
    }
}
