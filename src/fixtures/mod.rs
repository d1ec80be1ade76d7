//! Fixtures
//!
//! Loads catalogues, ranges, offers, vouchers and baskets from YAML files laid out as
//! `<base>/<kind>/<set>.yml`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use slotmap::SlotMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    basket::{Basket, BasketError},
    benefits::BenefitKind,
    conditions::ConditionKind,
    fixtures::{
        basket::BasketFixture, offers::OffersFixture, products::ProductsFixture,
        ranges::RangesFixture, vouchers::VouchersFixture,
    },
    offers::{ConditionalOffer, OfferError, OfferKey, OfferSet},
    products::{Catalogue, Product, ProductClass, ProductClassKey, ProductKey},
    ranges::Range,
    vouchers::{VoucherError, VoucherSet},
};

pub mod basket;
pub mod offers;
pub mod products;
pub mod ranges;
pub mod vouchers;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,

        /// Underlying IO error
        source: std::io::Error,
    },

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Invalid date format
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product class not found
    #[error("Product class not found: {0}")]
    ClassNotFound(String),

    /// Range not found
    #[error("Range not found: {0}")]
    RangeNotFound(String),

    /// Offer not found
    #[error("Offer not found: {0}")]
    OfferNotFound(String),

    /// Currency mismatch between products
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No priced products loaded yet
    #[error("No products loaded yet; currency unknown")]
    NoCurrency,

    /// Invalid offer
    #[error("Invalid offer: {0}")]
    Offer(#[from] OfferError),

    /// Invalid voucher
    #[error("Invalid voucher: {0}")]
    Voucher(#[from] VoucherError),

    /// Basket creation error
    #[error("Failed to create basket: {0}")]
    Basket(#[from] BasketError),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture<'a> {
    /// Base path for fixture files
    base_path: PathBuf,

    catalogue: Catalogue<'a>,
    classes: SlotMap<ProductClassKey, ProductClass>,
    ranges: FxHashMap<String, Range>,
    offers: OfferSet<'a>,
    vouchers: VoucherSet<'a>,

    /// String key -> `SlotMap` key mappings for lookups
    product_keys: FxHashMap<String, ProductKey>,
    class_keys: FxHashMap<String, ProductClassKey>,
    offer_keys: FxHashMap<String, OfferKey>,

    /// Basket lines, in order
    basket_lines: Vec<(ProductKey, u32)>,

    /// Currency for the fixture set
    currency: Option<&'static Currency>,
}

impl Default for Fixture<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Fixture<'a> {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            catalogue: SlotMap::with_key(),
            classes: SlotMap::with_key(),
            ranges: FxHashMap::default(),
            offers: SlotMap::with_key(),
            vouchers: VoucherSet::new(),
            product_keys: FxHashMap::default(),
            class_keys: FxHashMap::default(),
            offer_keys: FxHashMap::default(),
            basket_lines: Vec::new(),
            currency: None,
        }
    }

    fn file_path(&self, kind: &str, name: &str) -> PathBuf {
        self.base_path.join(kind).join(format!("{name}.yml"))
    }

    /// Load products and product classes from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if there are currency mismatches.
    pub fn load_products(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: ProductsFixture = read_yaml(&self.file_path("products", name))?;

        for (key, class_name) in fixture.classes {
            let class_key = self.classes.insert(ProductClass { name: class_name });

            self.class_keys.insert(key, class_key);
        }

        for (key, product_fixture) in fixture.products {
            let mut product = match &product_fixture.price {
                Some(price) => {
                    let (minor_units, currency) = products::parse_price(price)?;

                    self.check_currency(currency)?;

                    Product::new(
                        product_fixture.name,
                        rusty_money::Money::from_minor(minor_units, currency),
                    )
                }
                None => Product::unpriced(product_fixture.name),
            };

            if let Some(class) = &product_fixture.class {
                let class_key = self
                    .class_keys
                    .get(class)
                    .ok_or_else(|| FixtureError::ClassNotFound(class.clone()))?;

                product = product.with_class(*class_key);
            }

            let product_key = self.catalogue.insert(product);

            self.product_keys.insert(key, product_key);
        }

        debug!(products = self.catalogue.len(), "loaded products");

        Ok(self)
    }

    /// Load ranges from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or references unknown products.
    pub fn load_ranges(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: RangesFixture = read_yaml(&self.file_path("ranges", name))?;

        for (key, range_fixture) in fixture.ranges {
            let range = range_fixture.try_into_range(&self.product_keys, &self.class_keys)?;

            self.ranges.insert(key, range);
        }

        debug!(ranges = self.ranges.len(), "loaded ranges");

        Ok(self)
    }

    /// Load offers from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or an offer is invalid. Offer
    /// amounts must share the currency of the rest of the set.
    pub fn load_offers(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: OffersFixture = read_yaml(&self.file_path("offers", name))?;

        for (key, offer_fixture) in fixture.offers {
            let offer = offer_fixture.try_into_offer(&self.ranges)?;

            for currency in offer_currencies(&offer) {
                self.check_currency(currency)?;
            }

            let offer_key = self.offers.insert(offer);

            self.offer_keys.insert(key, offer_key);
        }

        debug!(offers = self.offers.len(), "loaded offers");

        Ok(self)
    }

    /// Load vouchers from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or a voucher is invalid.
    pub fn load_vouchers(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: VouchersFixture = read_yaml(&self.file_path("vouchers", name))?;

        for (_key, voucher_fixture) in fixture.vouchers {
            let voucher = voucher_fixture.try_into_voucher(&self.offer_keys)?;

            self.vouchers.insert(voucher)?;
        }

        debug!(vouchers = self.vouchers.len(), "loaded vouchers");

        Ok(self)
    }

    /// Load basket lines from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or references unknown products.
    pub fn load_basket(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: BasketFixture = read_yaml(&self.file_path("basket", name))?;

        for line in fixture.lines {
            let product_key = self.product_key(&line.product)?;

            self.basket_lines.push((product_key, line.quantity));
        }

        Ok(self)
    }

    /// Load every fixture file in a set. The vouchers file is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn load_set(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        self.load_products(name)?
            .load_ranges(name)?
            .load_offers(name)?;

        if self.file_path("vouchers", name).exists() {
            self.load_vouchers(name)?;
        }

        self.load_basket(name)
    }

    /// Load a complete fixture set from the default base path
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_set(name)?;

        Ok(fixture)
    }

    fn check_currency(&mut self, currency: &'static Currency) -> Result<(), FixtureError> {
        match self.currency {
            Some(existing) if existing != currency => Err(FixtureError::CurrencyMismatch(
                existing.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            )),
            Some(_) => Ok(()),
            None => {
                self.currency = Some(currency);
                Ok(())
            }
        }
    }

    /// Get a product by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product(&self, key: &str) -> Result<&Product<'a>, FixtureError> {
        self.catalogue
            .get(self.product_key(key)?)
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Get a product key by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product_key(&self, key: &str) -> Result<ProductKey, FixtureError> {
        self.product_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Get a product class key by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the class is not found.
    pub fn class_key(&self, key: &str) -> Result<ProductClassKey, FixtureError> {
        self.class_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::ClassNotFound(key.to_string()))
    }

    /// Get a range by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the range is not found.
    pub fn range(&self, key: &str) -> Result<&Range, FixtureError> {
        self.ranges
            .get(key)
            .ok_or_else(|| FixtureError::RangeNotFound(key.to_string()))
    }

    /// Get an offer key by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the offer is not found.
    pub fn offer_key(&self, key: &str) -> Result<OfferKey, FixtureError> {
        self.offer_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::OfferNotFound(key.to_string()))
    }

    /// Get an offer by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the offer is not found.
    pub fn offer(&self, key: &str) -> Result<&ConditionalOffer<'a>, FixtureError> {
        self.offers
            .get(self.offer_key(key)?)
            .ok_or_else(|| FixtureError::OfferNotFound(key.to_string()))
    }

    /// Product catalogue
    pub fn catalogue(&self) -> &Catalogue<'a> {
        &self.catalogue
    }

    /// Product classes
    pub fn classes(&self) -> &SlotMap<ProductClassKey, ProductClass> {
        &self.classes
    }

    /// All loaded offers
    pub fn offers(&self) -> &OfferSet<'a> {
        &self.offers
    }

    /// All loaded offers, for recording statistics
    pub fn offers_mut(&mut self) -> &mut OfferSet<'a> {
        &mut self.offers
    }

    /// All loaded vouchers
    pub fn vouchers(&self) -> &VoucherSet<'a> {
        &self.vouchers
    }

    /// All loaded vouchers, for adding to baskets and recording statistics
    pub fn vouchers_mut(&mut self) -> &mut VoucherSet<'a> {
        &mut self.vouchers
    }

    /// Get the fixture currency
    ///
    /// # Errors
    ///
    /// Returns an error if no priced products have been loaded.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }

    /// Create a basket from the loaded basket lines
    ///
    /// # Errors
    ///
    /// Returns an error if no priced products are loaded or a line cannot be added.
    pub fn basket(&self) -> Result<Basket<'a>, FixtureError> {
        let mut basket = Basket::new(self.currency()?);

        for (product_key, quantity) in &self.basket_lines {
            let product = self
                .catalogue
                .get(*product_key)
                .ok_or_else(|| FixtureError::ProductNotFound(format!("{product_key:?}")))?;

            basket.add_product(*product_key, product, *quantity)?;
        }

        Ok(basket)
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, FixtureError> {
    let contents = fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_norway::from_str(&contents)?)
}

/// Currencies of the amounts an offer carries
fn offer_currencies(
    offer: &ConditionalOffer<'static>,
) -> impl Iterator<Item = &'static Currency> {
    let threshold = match offer.condition().kind() {
        ConditionKind::Value(value) => Some(value.currency()),
        ConditionKind::Count(_) | ConditionKind::Coverage(_) => None,
    };

    let amount = match offer.benefit().kind() {
        BenefitKind::Absolute(amount) | BenefitKind::FixedPrice(amount) => Some(amount.currency()),
        BenefitKind::Percentage(_) | BenefitKind::Multibuy => None,
    };

    threshold.into_iter().chain(amount)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rusty_money::{Money, iso::GBP};
    use tempfile::TempDir;
    use testresult::TestResult;

    use crate::offers::applicator::OfferApplicator;

    use super::*;

    fn write_fixture(base: &Path, category: &str, name: &str, contents: &str) -> TestResult {
        let dir = base.join(category);

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    fn minimal_set(base: &Path) -> TestResult {
        write_fixture(
            base,
            "products",
            "mini",
            r"
classes:
  kitchen: Kitchenware
products:
  mug:
    name: Mug
    class: kitchen
    price: 5.00 GBP
  gift:
    name: Gift wrap
",
        )?;
        write_fixture(
            base,
            "ranges",
            "mini",
            "ranges:\n  kitchen:\n    name: Kitchen\n    classes: [kitchen]\n",
        )?;
        write_fixture(
            base,
            "offers",
            "mini",
            r"
offers:
  bogof:
    name: Mugs BOGOF
    start_date: 2011-01-01
    end_date: 2012-01-01
    condition: { type: count, range: kitchen, value: 1 }
    benefit: { type: multibuy, range: kitchen }
",
        )?;
        write_fixture(
            base,
            "basket",
            "mini",
            "lines:\n  - product: mug\n    quantity: 2\n",
        )?;

        Ok(())
    }

    #[test]
    fn fixture_loads_set_without_vouchers() -> TestResult {
        let dir = TempDir::new()?;
        minimal_set(dir.path())?;

        let mut fixture = Fixture::with_base_path(dir.path());
        fixture.load_set("mini")?;

        assert_eq!(fixture.catalogue().len(), 2);
        assert_eq!(fixture.classes().len(), 1);
        assert!(fixture.vouchers().is_empty());
        assert_eq!(fixture.currency()?, GBP);
        assert!(!fixture.product("gift")?.has_price());

        let kitchen = fixture.class_key("kitchen")?;
        assert_eq!(fixture.product("mug")?.product_class, Some(kitchen));
        assert!(fixture.range("kitchen")?.classes().contains(&kitchen));

        let mut basket = fixture.basket()?;
        assert_eq!(basket.num_items(), 2);

        OfferApplicator::new(fixture.offers(), date(2011, 6, 1)).apply(&mut basket)?;

        assert_eq!(basket.total()?, Money::from_minor(500, GBP));

        Ok(())
    }

    #[test]
    fn fixture_loads_bundled_oscar_set() -> TestResult {
        let fixture = Fixture::from_set("oscar")?;

        assert!(!fixture.catalogue().is_empty());
        assert!(!fixture.offers().is_empty());
        assert!(!fixture.vouchers().is_empty());
        assert!(fixture.basket()?.num_items() > 0);

        Ok(())
    }

    #[test]
    fn fixture_missing_file_reports_path() {
        let mut fixture = Fixture::with_base_path("/nonexistent");
        let fixture_result = fixture.load_products("nope").map(|_| ());

        assert!(matches!(
            fixture_result,
            Err(FixtureError::Io { path, .. }) if path.ends_with("products/nope.yml")
        ));
    }

    #[test]
    fn fixture_load_products_rejects_currency_mismatch() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(
            dir.path(),
            "products",
            "usd_set",
            "products:\n  apple:\n    name: Apple\n    price: 1.00 USD\n",
        )?;
        write_fixture(
            dir.path(),
            "products",
            "gbp_set",
            "products:\n  banana:\n    name: Banana\n    price: 1.00 GBP\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_products("usd_set")?;

        let result = fixture.load_products("gbp_set");

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));

        Ok(())
    }

    #[test]
    fn fixture_rejects_unknown_class() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(
            dir.path(),
            "products",
            "bad",
            "products:\n  mug:\n    name: Mug\n    class: garden\n    price: 5.00 GBP\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());
        let result = fixture.load_products("bad").map(|_| ());

        assert!(matches!(result, Err(FixtureError::ClassNotFound(class)) if class == "garden"));

        Ok(())
    }

    #[test]
    fn fixture_rejects_vouchers_for_unknown_offers() -> TestResult {
        let dir = TempDir::new()?;

        write_fixture(
            dir.path(),
            "vouchers",
            "bad",
            r"
vouchers:
  spring:
    name: Spring
    code: SPRING
    start_date: 2011-01-01
    end_date: 2011-02-01
    offers: [missing]
",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());
        let result = fixture.load_vouchers("bad").map(|_| ());

        assert!(matches!(result, Err(FixtureError::OfferNotFound(offer)) if offer == "missing"));

        Ok(())
    }

    #[test]
    fn fixture_basket_without_products_has_no_currency() {
        let fixture = Fixture::new();

        assert!(matches!(fixture.basket(), Err(FixtureError::NoCurrency)));
    }

    #[test]
    fn fixture_lookups_report_missing_keys() {
        let fixture = Fixture::new();

        assert!(matches!(fixture.product("nope"), Err(FixtureError::ProductNotFound(_))));
        assert!(matches!(fixture.range("nope"), Err(FixtureError::RangeNotFound(_))));
        assert!(matches!(fixture.offer("nope"), Err(FixtureError::OfferNotFound(_))));
        assert!(matches!(fixture.class_key("nope"), Err(FixtureError::ClassNotFound(_))));
    }

    #[test]
    fn fixture_rejects_offer_amounts_in_another_currency() -> TestResult {
        let dir = TempDir::new()?;
        minimal_set(dir.path())?;

        write_fixture(
            dir.path(),
            "offers",
            "dollars",
            r"
offers:
  dollar_off:
    name: $1 off mugs
    start_date: 2011-01-01
    end_date: 2012-01-01
    condition: { type: count, range: kitchen, value: 1 }
    benefit: { type: absolute, range: kitchen, value: 1.00 USD }
",
        )?;
        write_fixture(
            dir.path(),
            "offers",
            "dollar_threshold",
            r"
offers:
  spend_ten_dollars:
    name: Spend $10 on mugs
    start_date: 2011-01-01
    end_date: 2012-01-01
    condition: { type: value, range: kitchen, value: 10.00 USD }
    benefit: { type: percentage, range: kitchen, value: 10% }
",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());
        fixture.load_products("mini")?.load_ranges("mini")?;

        let absolute = fixture.load_offers("dollars").map(|_| ());
        let threshold = fixture.load_offers("dollar_threshold").map(|_| ());

        assert!(matches!(
            absolute,
            Err(FixtureError::CurrencyMismatch(set, offer)) if set == "GBP" && offer == "USD"
        ));
        assert!(matches!(threshold, Err(FixtureError::CurrencyMismatch(_, _))));
        assert!(fixture.offers().is_empty());

        Ok(())
    }

    #[test]
    fn fixture_rejects_fixed_price_behind_value_condition() -> TestResult {
        let dir = TempDir::new()?;
        minimal_set(dir.path())?;

        write_fixture(
            dir.path(),
            "offers",
            "bundle",
            r"
offers:
  spend_and_fix:
    name: Spend £10, pay £8
    start_date: 2011-01-01
    end_date: 2012-01-01
    condition: { type: value, range: kitchen, value: 10.00 GBP }
    benefit: { type: fixed_price, range: kitchen, value: 8.00 GBP }
",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());
        fixture.load_products("mini")?.load_ranges("mini")?;

        let result = fixture.load_offers("bundle").map(|_| ());

        assert!(matches!(
            result,
            Err(FixtureError::Offer(OfferError::UnsupportedCondition))
        ));

        Ok(())
    }
}
