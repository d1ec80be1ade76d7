//! Offer Applicator
//!
//! Selects the offers that apply to a basket and applies each of them as many times as
//! the basket allows.

use std::cmp::Reverse;

use jiff::civil::Date;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    basket::Basket,
    offers::{OfferError, OfferKey, OfferSet, OfferType},
    vouchers::{OrderId, UserId, VoucherError, VoucherKey, VoucherSet},
};

/// Summary of one offer's applications to a basket.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferDiscount<'a> {
    /// Applied offer
    pub offer: OfferKey,

    /// Offer name at the time it was applied
    pub name: String,

    /// Voucher that unlocked the offer, if any
    pub voucher: Option<VoucherKey>,

    /// Number of times the offer was applied
    pub frequency: u32,

    /// Total discount granted by the offer
    pub discount: Money<'a, Currency>,
}

/// Offers selected for a basket, with the voucher that unlocked each one.
pub type SelectedOffers = SmallVec<[(OfferKey, Option<VoucherKey>); 8]>;

/// Applies offers to baskets on a given date.
#[derive(Debug)]
pub struct OfferApplicator<'o, 'a> {
    offers: &'o OfferSet<'a>,
    vouchers: Option<&'o VoucherSet<'a>>,
    user: Option<UserId>,
    date: Date,
}

impl<'o, 'a> OfferApplicator<'o, 'a> {
    /// Create an applicator for site offers only.
    pub fn new(offers: &'o OfferSet<'a>, date: Date) -> Self {
        Self {
            offers,
            vouchers: None,
            user: None,
            date,
        }
    }

    /// Also apply offers unlocked by the basket's vouchers, as available to `user`.
    #[must_use]
    pub fn with_vouchers(mut self, vouchers: &'o VoucherSet<'a>, user: Option<UserId>) -> Self {
        self.vouchers = Some(vouchers);
        self.user = user;
        self
    }

    /// Offers to apply to `basket`, in application order.
    ///
    /// Active site offers come first, highest priority first, followed by active offers
    /// unlocked by vouchers in the basket. An offer is only selected once.
    pub fn offers_for(&self, basket: &Basket<'_>) -> SelectedOffers {
        let mut site: SmallVec<[(OfferKey, i32); 8]> = self
            .offers
            .iter()
            .filter(|(_, offer)| {
                offer.offer_type() == OfferType::Site && offer.is_active(self.date)
            })
            .map(|(key, offer)| (key, offer.priority()))
            .collect();

        // Stable, so equal priorities keep insertion order
        site.sort_by_key(|(_, priority)| Reverse(*priority));

        let mut selected: SelectedOffers = site.into_iter().map(|(key, _)| (key, None)).collect();

        let Some(vouchers) = self.vouchers else {
            return selected;
        };

        for voucher_key in basket.vouchers() {
            let Some(voucher) = vouchers.get(*voucher_key) else {
                continue;
            };

            if !voucher.is_active(self.date) {
                debug!(code = voucher.code(), "skipping inactive voucher");
                continue;
            }

            if let Err(reason) = voucher.is_available_to_user(self.user) {
                debug!(code = voucher.code(), %reason, "skipping unavailable voucher");
                continue;
            }

            for offer_key in voucher.offers() {
                let active = self
                    .offers
                    .get(*offer_key)
                    .is_some_and(|offer| offer.is_active(self.date));

                if active && !selected.iter().any(|(key, _)| key == offer_key) {
                    selected.push((*offer_key, Some(*voucher_key)));
                }
            }
        }

        selected
    }

    /// Apply every selected offer to `basket`, replacing any previous applications.
    ///
    /// Each offer is applied repeatedly until it grants no further discount. The per-offer
    /// summaries are stored on the basket, largest discount first, and returned.
    ///
    /// # Errors
    ///
    /// Returns an [`OfferError`] if applying an offer fails. The basket is left without
    /// any offer applications in that case.
    #[tracing::instrument(
        name = "offers.apply",
        skip_all,
        fields(
            date = %self.date,
            lines = basket.num_lines(),
            vouchers = basket.vouchers().len()
        )
    )]
    pub fn apply(&self, basket: &mut Basket<'a>) -> Result<Vec<OfferDiscount<'a>>, OfferError> {
        basket.reset_offer_applications();

        let discounts = match self.apply_selected(basket) {
            Ok(discounts) => discounts,
            Err(error) => {
                warn!(%error, "offer application failed");

                basket.reset_offer_applications();

                return Err(error);
            }
        };

        basket.set_discounts(discounts.clone());

        Ok(discounts)
    }

    fn apply_selected(
        &self,
        basket: &mut Basket<'a>,
    ) -> Result<Vec<OfferDiscount<'a>>, OfferError> {
        let mut discounts = Vec::new();

        for (offer_key, voucher) in self.offers_for(basket) {
            let offer = self.offers.get(offer_key).ok_or(OfferError::OfferNotFound)?;

            let mut total = basket.zero();
            let mut frequency = 0u32;

            loop {
                let available = basket.num_items_without_discount();
                let discount = offer.apply_benefit(basket)?;

                if discount.is_zero() {
                    break;
                }

                total = total.add(discount)?;
                frequency += 1;

                debug!(offer = offer.name(), %discount, frequency, "applied offer");

                if basket.num_items_without_discount() >= available {
                    break;
                }
            }

            if frequency > 0 {
                discounts.push(OfferDiscount {
                    offer: offer_key,
                    name: offer.name().to_string(),
                    voucher,
                    frequency,
                    discount: total,
                });
            }
        }

        discounts.sort_by_key(|applied| Reverse(applied.discount.to_minor_units()));

        let total_discount = basket.total_discount()?;

        info!(offers = discounts.len(), %total_discount, "applied offers");

        Ok(discounts)
    }
}

/// Errors raised while recording an order.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Offer statistics could not be updated.
    #[error(transparent)]
    Offer(#[from] OfferError),

    /// Voucher statistics could not be updated.
    #[error(transparent)]
    Voucher(#[from] VoucherError),
}

/// Record a placed order against the offers and vouchers applied to `basket`.
///
/// Every applied offer records its discount. Every voucher in the basket records the
/// order along with the discount granted by the offers it unlocked.
///
/// # Errors
///
/// Returns a [`RecordError`] if a statistic cannot be updated.
pub fn record_order<'a>(
    basket: &Basket<'a>,
    offers: &mut OfferSet<'a>,
    vouchers: &mut VoucherSet<'a>,
    order: OrderId,
    user: Option<UserId>,
    date: Date,
) -> Result<(), RecordError> {
    for applied in basket.discounts() {
        offers
            .get_mut(applied.offer)
            .ok_or(OfferError::OfferNotFound)?
            .record_usage(applied.discount)?;
    }

    for voucher_key in basket.vouchers() {
        let Some(voucher) = vouchers.get_mut(*voucher_key) else {
            continue;
        };

        voucher.record_usage(order, user, date);

        for applied in basket
            .discounts()
            .iter()
            .filter(|applied| applied.voucher == Some(*voucher_key))
        {
            voucher.record_discount(applied.discount)?;
        }

        info!(code = voucher.code(), order = order.0, "recorded voucher usage");
    }

    Ok(())
}
