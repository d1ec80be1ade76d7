//! Products

use rusty_money::{Money, iso::Currency};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Product Key
    pub struct ProductKey;
}

new_key_type! {
    /// Product Class Key
    pub struct ProductClassKey;
}

/// Product catalogue, keyed by [`ProductKey`].
pub type Catalogue<'a> = SlotMap<ProductKey, Product<'a>>;

/// A class of products (e.g. "Books"), used by ranges to include whole families of products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductClass {
    /// Class name
    pub name: String,
}

/// Product
#[derive(Debug, Clone)]
pub struct Product<'a> {
    /// Product name
    pub name: String,

    /// Product class, if any
    pub product_class: Option<ProductClassKey>,

    /// Product price. `None` means the product has no stock record and cannot be sold.
    pub price: Option<Money<'a, Currency>>,
}

impl<'a> Product<'a> {
    /// Create a priced product with no class.
    pub fn new(name: impl Into<String>, price: Money<'a, Currency>) -> Self {
        Self {
            name: name.into(),
            product_class: None,
            price: Some(price),
        }
    }

    /// Create a product without a price.
    pub fn unpriced(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product_class: None,
            price: None,
        }
    }

    /// Assign the product to a class.
    #[must_use]
    pub fn with_class(mut self, class: ProductClassKey) -> Self {
        self.product_class = Some(class);
        self
    }

    /// Returns true if the product can be priced.
    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}
