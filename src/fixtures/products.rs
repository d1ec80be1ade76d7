//! Product Fixtures

use std::str::FromStr;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::iso::{self, Currency};
use serde::Deserialize;

use crate::fixtures::FixtureError;

/// Wrapper for products and product classes in YAML
#[derive(Debug, Deserialize)]
pub struct ProductsFixture {
    /// Map of class key -> class name
    #[serde(default)]
    pub classes: FxHashMap<String, String>,

    /// Map of product key -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

/// Product fixture from YAML
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Product class key
    #[serde(default)]
    pub class: Option<String>,

    /// Price string (e.g., "2.99 GBP"). Unpriced products cannot be added to baskets.
    #[serde(default)]
    pub price: Option<String>,
}

/// Parse a price string (e.g., "2.99 GBP") into minor units and a currency.
///
/// # Errors
///
/// Returns an error if the string is not an amount followed by a currency code, the
/// currency is unknown, or the amount is negative or more precise than the currency.
pub fn parse_price(price: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let mut parts = price.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(price.to_string()));
    };

    let currency =
        iso::find(code).ok_or_else(|| FixtureError::UnknownCurrency(code.to_string()))?;

    let amount = Decimal::from_str(amount)
        .map_err(|_err| FixtureError::InvalidPrice(price.to_string()))?;

    let minor = 10u64
        .checked_pow(currency.exponent)
        .map(Decimal::from)
        .and_then(|scale| amount.checked_mul(scale))
        .filter(|minor| minor.fract().is_zero() && !minor.is_sign_negative())
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(price.to_string()))?;

    Ok((minor, currency))
}
