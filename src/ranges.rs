//! Ranges
//!
//! A range is a named set of eligible products. Membership is decided by, in order:
//! explicit exclusions, the "all products" flag, included product classes and finally
//! the explicit inclusion list.

use rustc_hash::FxHashSet;

use crate::{
    basket::Line,
    products::{Product, ProductClassKey, ProductKey},
};

/// Product eligibility grouping used by conditions and benefits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    name: String,
    includes_all_products: bool,
    included_products: FxHashSet<ProductKey>,
    excluded_products: FxHashSet<ProductKey>,
    classes: FxHashSet<ProductClassKey>,
}

impl Range {
    /// Create an empty range that contains no products.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a range that contains every product.
    pub fn all_products(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            includes_all_products: true,
            ..Self::default()
        }
    }

    /// Range name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the range includes every product not explicitly excluded.
    pub fn includes_all_products(&self) -> bool {
        self.includes_all_products
    }

    /// Set the "all products" flag.
    pub fn set_includes_all_products(&mut self, includes_all_products: bool) -> &mut Self {
        self.includes_all_products = includes_all_products;
        self
    }

    /// Whitelist a product.
    pub fn include_product(&mut self, product: ProductKey) -> &mut Self {
        self.included_products.insert(product);
        self
    }

    /// Blacklist a product. Exclusions take precedence over every inclusion rule.
    pub fn exclude_product(&mut self, product: ProductKey) -> &mut Self {
        self.excluded_products.insert(product);
        self
    }

    /// Include every product of the given class.
    pub fn include_class(&mut self, class: ProductClassKey) -> &mut Self {
        self.classes.insert(class);
        self
    }

    /// Explicitly included products.
    pub fn included_products(&self) -> &FxHashSet<ProductKey> {
        &self.included_products
    }

    /// Explicitly excluded products.
    pub fn excluded_products(&self) -> &FxHashSet<ProductKey> {
        &self.excluded_products
    }

    /// Included product classes.
    pub fn classes(&self) -> &FxHashSet<ProductClassKey> {
        &self.classes
    }

    /// Returns whether the product belongs to this range.
    pub fn contains_product(&self, key: ProductKey, product: &Product<'_>) -> bool {
        self.contains(key, product.product_class)
    }

    /// Returns whether the product on a basket line belongs to this range.
    pub fn contains_line(&self, line: &Line<'_>) -> bool {
        self.contains(line.product(), line.product_class())
    }

    fn contains(&self, key: ProductKey, class: Option<ProductClassKey>) -> bool {
        if self.excluded_products.contains(&key) {
            return false;
        }

        if self.includes_all_products {
            return true;
        }

        if class.is_some_and(|class| self.classes.contains(&class)) {
            return true;
        }

        self.included_products.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::GBP};
    use slotmap::SlotMap;

    use crate::products::{Catalogue, ProductClass};

    use super::*;

    fn catalogue() -> (Catalogue<'static>, ProductKey, ProductClassKey) {
        let mut classes = SlotMap::<ProductClassKey, ProductClass>::with_key();
        let class = classes.insert(ProductClass {
            name: "Clothing".to_string(),
        });

        let mut catalogue = Catalogue::with_key();
        let key = catalogue
            .insert(Product::new("T-Shirt", Money::from_minor(500, GBP)).with_class(class));

        (catalogue, key, class)
    }

    #[test]
    fn all_products_range_contains_product() {
        let (catalogue, key, _) = catalogue();
        let range = Range::all_products("All products");

        assert!(range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn all_products_range_respects_exclusions() {
        let (catalogue, key, _) = catalogue();
        let mut range = Range::all_products("All products");
        range.exclude_product(key);

        assert!(!range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn empty_range_contains_nothing() {
        let (catalogue, key, _) = catalogue();
        let range = Range::new("Empty");

        assert!(!range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn whitelisted_product_is_contained() {
        let (catalogue, key, _) = catalogue();
        let mut range = Range::new("Whitelist");
        range.include_product(key);

        assert!(range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn included_class_contains_product() {
        let (catalogue, key, class) = catalogue();
        let mut range = Range::new("Clothing");
        range.include_class(class);

        assert!(range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn included_class_respects_exclusions() {
        let (catalogue, key, class) = catalogue();
        let mut range = Range::new("Clothing");
        range.include_class(class).exclude_product(key);

        assert!(!range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn exclusion_beats_whitelist() {
        let (catalogue, key, _) = catalogue();
        let mut range = Range::new("Contradiction");
        range.include_product(key).exclude_product(key);

        assert!(!range.contains_product(key, &catalogue[key]));
    }

    #[test]
    fn including_twice_is_idempotent() {
        let (_, key, _) = catalogue();
        let mut range = Range::new("Twice");
        range.include_product(key).include_product(key);

        assert_eq!(range.included_products().len(), 1);
    }
}
