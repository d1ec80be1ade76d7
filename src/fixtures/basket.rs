//! Basket Fixtures

use serde::Deserialize;

/// Basket contents from YAML, in line order
#[derive(Debug, Deserialize)]
pub struct BasketFixture {
    /// Basket lines
    pub lines: Vec<LineFixture>,
}

/// A basket line from YAML
#[derive(Debug, Deserialize)]
pub struct LineFixture {
    /// Product key
    pub product: String,

    /// Units to add, one unless given
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}
