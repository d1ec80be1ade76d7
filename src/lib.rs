//! Rebate
//!
//! Rebate is a conditional offer engine for shopping baskets. Offers pair a
//! [`conditions::Condition`] with a [`benefits::Benefit`], both bound to a
//! [`ranges::Range`] of eligible products, and consume basket line quantities
//! as they are applied so no unit is counted twice.

pub mod basket;
pub mod benefits;
pub mod conditions;
pub mod discounts;
pub mod fixtures;
pub mod offers;
pub mod prelude;
pub mod products;
pub mod ranges;
pub mod receipt;
pub mod vouchers;
