//! Range Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    products::{ProductClassKey, ProductKey},
    ranges::Range,
};

/// Wrapper for ranges in YAML
#[derive(Debug, Deserialize)]
pub struct RangesFixture {
    /// Map of range key -> range fixture
    pub ranges: FxHashMap<String, RangeFixture>,
}

/// Range fixture from YAML
#[derive(Debug, Deserialize)]
pub struct RangeFixture {
    /// Range name
    pub name: String,

    /// Whether every product is in range unless excluded
    #[serde(default)]
    pub includes_all_products: bool,

    /// Product keys explicitly in range
    #[serde(default)]
    pub included_products: Vec<String>,

    /// Product keys never in range
    #[serde(default)]
    pub excluded_products: Vec<String>,

    /// Product class keys whose products are in range
    #[serde(default)]
    pub classes: Vec<String>,
}

impl RangeFixture {
    /// Resolve product and class keys and build the range.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced product or class is not loaded.
    pub fn try_into_range(
        self,
        products: &FxHashMap<String, ProductKey>,
        classes: &FxHashMap<String, ProductClassKey>,
    ) -> Result<Range, FixtureError> {
        let mut range = Range::new(self.name);

        range.set_includes_all_products(self.includes_all_products);

        for product in &self.included_products {
            range.include_product(lookup_product(products, product)?);
        }

        for product in &self.excluded_products {
            range.exclude_product(lookup_product(products, product)?);
        }

        for class in &self.classes {
            let key = classes
                .get(class)
                .ok_or_else(|| FixtureError::ClassNotFound(class.clone()))?;

            range.include_class(*key);
        }

        Ok(range)
    }
}

fn lookup_product(
    products: &FxHashMap<String, ProductKey>,
    key: &str,
) -> Result<ProductKey, FixtureError> {
    products
        .get(key)
        .copied()
        .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
}
