//! Receipt

use std::io;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows, Segment},
        style::BorderColor,
    },
};
use thiserror::Error;

use crate::{
    basket::{Basket, BasketError},
    offers::applicator::OfferDiscount,
    products::{Catalogue, ProductKey},
    vouchers::VoucherSet,
};

/// Errors that can occur when building a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Error calculating basket totals.
    #[error(transparent)]
    Basket(#[from] BasketError),

    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Error finding a product in the product catalogue.
    #[error("Missing product")]
    MissingProduct(ProductKey),

    /// IO error
    #[error("IO error")]
    IO,
}

/// A priced basket line on the receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLine<'a> {
    /// Product on the line
    pub product: ProductKey,

    /// Units bought
    pub quantity: u32,

    /// Price of one unit
    pub unit_price: Money<'a, Currency>,

    /// Price of all units before discounts
    pub line_price: Money<'a, Currency>,

    /// Discount granted on the line
    pub discount: Money<'a, Currency>,

    /// Price of all units after discounts
    pub final_price: Money<'a, Currency>,
}

/// Final receipt for a basket with offers applied.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    lines: SmallVec<[ReceiptLine<'a>; 10]>,
    offers: Vec<OfferDiscount<'a>>,
    subtotal: Money<'a, Currency>,
    total: Money<'a, Currency>,
    currency: &'static Currency,
}

impl<'a> Receipt<'a> {
    /// Build a receipt from a basket's lines and applied offers.
    ///
    /// # Errors
    ///
    /// Returns a [`ReceiptError`] if a line or basket total cannot be calculated.
    pub fn from_basket(basket: &Basket<'a>) -> Result<Self, ReceiptError> {
        let lines = basket
            .all_lines()
            .iter()
            .map(|line| -> Result<_, ReceiptError> {
                Ok(ReceiptLine {
                    product: line.product(),
                    quantity: line.quantity(),
                    unit_price: line.unit_price(),
                    line_price: line.line_price()?,
                    discount: line.discount_total(),
                    final_price: line.line_price_after_discounts()?,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Receipt {
            lines,
            offers: basket.discounts().to_vec(),
            subtotal: basket.subtotal()?,
            total: basket.total()?,
            currency: basket.currency(),
        })
    }

    /// Receipt lines, in basket order.
    pub fn lines(&self) -> &[ReceiptLine<'a>] {
        &self.lines
    }

    /// Applied offers, largest discount first.
    pub fn offers(&self) -> &[OfferDiscount<'a>] {
        &self.offers
    }

    /// Total cost before any offers
    #[must_use]
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Total amount paid after offers
    #[must_use]
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Currency used for all monetary values.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Calculate the savings made by applying offers.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction operation fails.
    pub fn savings(&self) -> Result<Money<'a, Currency>, MoneyError> {
        self.subtotal.sub(self.total)
    }

    /// Calculates the savings made by applying offers as a percentage
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the subtraction operation fails.
    pub fn savings_percent(&self) -> Result<Percentage, MoneyError> {
        let savings_minor = self.savings()?.to_minor_units();
        let subtotal_minor = self.subtotal.to_minor_units();

        if subtotal_minor == 0 {
            return Ok(Percentage::from(0.0));
        }

        let savings_dec = Decimal::from_i64(savings_minor).unwrap_or(Decimal::ZERO);
        let subtotal_dec = Decimal::from_i64(subtotal_minor).unwrap_or(Decimal::ZERO);

        Ok(Percentage::from(savings_dec / subtotal_dec))
    }

    /// Writes the receipt tables and totals.
    ///
    /// # Errors
    ///
    /// Returns an error if a product is missing from the catalogue or the receipt cannot
    /// be written.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        catalogue: &Catalogue<'_>,
        vouchers: Option<&VoucherSet<'_>>,
    ) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();
        let mut color_ops: SmallVec<[(usize, usize, Color); 32]> = SmallVec::new();

        builder.push_record([
            "",
            "Item",
            "Qty",
            "Unit Price",
            "Line Price",
            "Savings",
            "Final Price",
        ]);

        for (idx, line) in self.lines.iter().enumerate() {
            let row = idx + 1;
            let name = catalogue
                .get(line.product)
                .map(|product| product.name.clone())
                .ok_or(ReceiptError::MissingProduct(line.product))?;

            let discounted = !line.discount.is_zero();

            let (savings, final_price) = if discounted {
                let percent_points = percent_points(line.discount, line.line_price);

                (
                    format!("({percent_points:.2}%) -{}", line.discount),
                    format!("{}", line.final_price),
                )
            } else {
                (String::new(), String::new())
            };

            builder.push_record([
                format!("#{row:<3}"),
                name,
                line.quantity.to_string(),
                format!("{}", line.unit_price),
                format!("{}", line.line_price),
                savings,
                final_price,
            ]);

            color_ops.push((row, 3, Color::FG_BRIGHT_BLACK));

            if discounted {
                color_ops.push((row, 6, Color::FG_GREEN));
            }
        }

        write_table(&mut out, builder, Columns::new(2..7), color_ops)?;

        if !self.offers.is_empty() {
            write_offers_table(&mut out, &self.offers, vouchers)?;
        }

        write_receipt_summary(&mut out, self)
    }
}

fn write_offers_table(
    out: &mut impl io::Write,
    offers: &[OfferDiscount<'_>],
    vouchers: Option<&VoucherSet<'_>>,
) -> Result<(), ReceiptError> {
    let mut builder = Builder::default();
    let mut color_ops: SmallVec<[(usize, usize, Color); 32]> = SmallVec::new();

    builder.push_record(["Offer", "Voucher", "Applied", "Discount"]);

    for (idx, applied) in offers.iter().enumerate() {
        let voucher = applied
            .voucher
            .and_then(|key| vouchers.and_then(|vouchers| vouchers.get(key)))
            .map(|voucher| voucher.code().to_string())
            .unwrap_or_default();

        builder.push_record([
            applied.name.clone(),
            voucher,
            format!("{}x", applied.frequency),
            format!("-{}", applied.discount),
        ]);

        color_ops.push((idx + 1, 3, Color::FG_GREEN));
    }

    write_table(out, builder, Columns::new(2..4), color_ops)
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    right_aligned: Columns<std::ops::Range<usize>>,
    color_ops: SmallVec<[(usize, usize, Color); 32]>,
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(right_aligned, Alignment::right());

    for (row, col, color) in color_ops {
        table.modify((row, col), color);
    }

    table.modify(Segment::all(), BorderColor::filled(Color::FG_BRIGHT_BLACK));

    writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)
}

fn write_receipt_summary(
    out: &mut impl io::Write,
    receipt: &Receipt<'_>,
) -> Result<(), ReceiptError> {
    let savings = receipt.savings()?;
    let savings_points = percent_points(savings, receipt.subtotal());

    let mut builder = Builder::default();

    builder.push_record(["Subtotal:".to_string(), receipt.subtotal().to_string()]);
    builder.push_record([
        "Savings:".to_string(),
        format!("({savings_points:.2}%) -{savings}"),
    ]);
    builder.push_record(["Total:".to_string(), receipt.total().to_string()]);

    let mut table = builder.build();

    table.with(Style::blank());
    table.modify(Columns::new(0..2), Alignment::right());
    table.modify(Rows::last(), Color::BOLD);

    writeln!(out, "{table}\n").map_err(|_err| ReceiptError::IO)
}

/// Share of `whole` taken by `part`, in percent points to two decimal places.
fn percent_points(part: Money<'_, Currency>, whole: Money<'_, Currency>) -> Decimal {
    let whole = Decimal::from_i64(whole.to_minor_units()).unwrap_or(Decimal::ZERO);

    if whole.is_zero() {
        return Decimal::ZERO;
    }

    let part = Decimal::from_i64(part.to_minor_units()).unwrap_or(Decimal::ZERO);

    (part * Decimal::ONE_HUNDRED / whole).round_dp(2)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::{
        benefits::Benefit,
        conditions::Condition,
        offers::{ConditionalOffer, OfferSet, applicator::OfferApplicator},
        products::Product,
        ranges::Range,
    };

    use super::*;

    fn gbp(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, GBP)
    }

    fn discounted_basket() -> TestResult<(Catalogue<'static>, Basket<'static>)> {
        let mut catalogue = Catalogue::with_key();
        let mug = catalogue.insert(Product::new("Mug", gbp(500)));
        let pen = catalogue.insert(Product::new("Pen", gbp(200)));

        let mut mugs = Range::new("Mugs");
        mugs.include_product(mug);

        let mut offers = OfferSet::with_key();
        offers.insert(ConditionalOffer::new(
            "Mugs: buy one get one free",
            Condition::count(mugs.clone(), 1),
            Benefit::multibuy(mugs),
            date(2011, 1, 1),
            date(2012, 1, 1),
        ));

        let mut basket = Basket::new(GBP);
        basket.add_product(mug, &catalogue[mug], 2)?;
        basket.add_product(pen, &catalogue[pen], 1)?;

        OfferApplicator::new(&offers, date(2011, 6, 1)).apply(&mut basket)?;

        Ok((catalogue, basket))
    }

    #[test]
    fn from_basket_captures_lines_and_totals() -> TestResult {
        let (_, basket) = discounted_basket()?;
        let receipt = Receipt::from_basket(&basket)?;

        assert_eq!(receipt.lines().len(), 2);
        assert_eq!(receipt.subtotal(), gbp(1200));
        assert_eq!(receipt.total(), gbp(700));
        assert_eq!(receipt.savings()?, gbp(500));
        assert_eq!(receipt.offers().len(), 1);
        assert_eq!(receipt.currency(), GBP);

        let mug_line = receipt.lines().first().ok_or("missing mug line")?;

        assert_eq!(mug_line.line_price, gbp(1000));
        assert_eq!(mug_line.discount, gbp(500));
        assert_eq!(mug_line.final_price, gbp(500));

        Ok(())
    }

    #[test]
    fn savings_percent_is_relative_to_subtotal() -> TestResult {
        let (_, basket) = discounted_basket()?;
        let receipt = Receipt::from_basket(&basket)?;

        let points = (receipt.savings_percent()? * Decimal::ONE_HUNDRED).round_dp(2);

        assert_eq!(points, Decimal::new(4167, 2));
        assert_eq!(points, percent_points(receipt.savings()?, receipt.subtotal()));

        Ok(())
    }

    #[test]
    fn savings_percent_of_empty_basket_is_zero() -> TestResult {
        let receipt = Receipt::from_basket(&Basket::new(GBP))?;

        assert_eq!(receipt.savings_percent()? * Decimal::ONE, Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn write_to_renders_lines_offers_and_totals() -> TestResult {
        let (catalogue, basket) = discounted_basket()?;
        let receipt = Receipt::from_basket(&basket)?;

        let mut out = Vec::new();
        receipt.write_to(&mut out, &catalogue, None)?;

        let rendered = String::from_utf8(out)?;

        assert!(rendered.contains("Mug"));
        assert!(rendered.contains("Pen"));
        assert!(rendered.contains("Mugs: buy one get one free"));
        assert!(rendered.contains("Subtotal:"));
        assert!(rendered.contains("(50.00%) -£5.00"));
        assert!(rendered.contains("(41.67%) -£5.00"));
        assert!(rendered.contains("£7.00"));

        Ok(())
    }

    #[test]
    fn write_to_errors_for_unknown_products() -> TestResult {
        let (_, basket) = discounted_basket()?;
        let receipt = Receipt::from_basket(&basket)?;

        let result = receipt.write_to(Vec::new(), &Catalogue::with_key(), None);

        assert!(matches!(result, Err(ReceiptError::MissingProduct(_))));

        Ok(())
    }
}
