//! Rebate prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    basket::{Basket, BasketError, Line},
    benefits::{Benefit, BenefitError, BenefitKind},
    conditions::{Condition, ConditionError, ConditionKind},
    discounts::DiscountError,
    fixtures::{Fixture, FixtureError},
    offers::{
        ConditionalOffer, OfferError, OfferKey, OfferSet, OfferType,
        applicator::{OfferApplicator, OfferDiscount, RecordError, record_order},
    },
    products::{Catalogue, Product, ProductClass, ProductClassKey, ProductKey},
    ranges::Range,
    receipt::{Receipt, ReceiptError},
    vouchers::{
        OrderId, Unavailable, UserId, Voucher, VoucherError, VoucherKey, VoucherSet, VoucherUsage,
    },
};
