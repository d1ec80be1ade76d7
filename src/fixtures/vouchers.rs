//! Voucher Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    fixtures::{FixtureError, offers::parse_date},
    offers::OfferKey,
    vouchers::{Voucher, VoucherUsage},
};

/// Wrapper for vouchers in YAML
#[derive(Debug, Deserialize)]
pub struct VouchersFixture {
    /// Map of voucher key -> voucher fixture
    pub vouchers: FxHashMap<String, VoucherFixture>,
}

/// Voucher fixture from YAML
#[derive(Debug, Deserialize)]
pub struct VoucherFixture {
    /// Voucher name
    pub name: String,

    /// Code entered by the customer (case insensitive)
    pub code: String,

    /// Usage policy, `multi_use` unless given
    #[serde(default)]
    pub usage: VoucherUsage,

    /// First day the voucher is active
    pub start_date: String,

    /// First day the voucher is no longer active
    pub end_date: String,

    /// Offer keys unlocked by the voucher
    pub offers: Vec<String>,
}

impl VoucherFixture {
    /// Resolve offer keys and build the voucher.
    ///
    /// # Errors
    ///
    /// Returns an error if an offer is not loaded or a date is invalid.
    pub fn try_into_voucher(
        self,
        offers: &FxHashMap<String, OfferKey>,
    ) -> Result<Voucher<'static>, FixtureError> {
        let offer_keys = self
            .offers
            .iter()
            .map(|offer| {
                offers
                    .get(offer)
                    .copied()
                    .ok_or_else(|| FixtureError::OfferNotFound(offer.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Voucher::new(
            self.name,
            &self.code,
            offer_keys,
            parse_date(&self.start_date)?,
            parse_date(&self.end_date)?,
        )
        .with_usage(self.usage))
    }
}
