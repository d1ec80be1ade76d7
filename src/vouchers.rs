//! Vouchers
//!
//! A voucher is a code a customer enters to unlock voucher-only offers. Each voucher has a
//! usage policy limiting who may use it and how often.

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::Deserialize;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{basket::Basket, offers::OfferKey};

new_key_type! {
    /// Voucher Key
    pub struct VoucherKey;
}

/// Identifies a signed in customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

/// Identifies a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub u64);

/// How often a voucher may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherUsage {
    /// Can only be used by one customer, once.
    SingleUse,

    /// Can be used any number of times.
    #[default]
    MultiUse,

    /// Can be used once by each signed in customer.
    OncePerCustomer,
}

/// Why a voucher is unavailable to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// A single use voucher has already been applied to an order.
    #[error("This voucher has already been used")]
    AlreadyUsed,

    /// Once per customer vouchers cannot be used anonymously.
    #[error("This voucher is only available to signed in users")]
    SignedInUsersOnly,

    /// The user has already used this once per customer voucher.
    #[error("You have already used this voucher in a previous order")]
    AlreadyUsedByUser,
}

/// Errors raised by vouchers.
#[derive(Debug, Error)]
pub enum VoucherError {
    /// The voucher ends before it starts.
    #[error("End date {end} should be later than start date {start}")]
    InvalidDateRange {
        /// Start of the validity window
        start: Date,

        /// End of the validity window
        end: Date,
    },

    /// Voucher codes must be non-empty and contain no whitespace.
    #[error("Invalid voucher code {0:?}")]
    InvalidCode(String),

    /// Another voucher already uses this code.
    #[error("Voucher code {0} is already in use")]
    DuplicateCode(String),

    /// No voucher has this code.
    #[error("No voucher with code {0}")]
    UnknownCode(String),

    /// The voucher is outside its validity window.
    #[error("Voucher {0} is not active")]
    Inactive(String),

    /// The voucher cannot be used by this user.
    #[error("Voucher {code} is unavailable: {reason}")]
    Unavailable {
        /// Voucher code
        code: String,

        /// Why the voucher is unavailable
        #[source]
        reason: Unavailable,
    },

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// A use of a voucher in a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherApplication {
    /// Order the voucher was used in
    pub order: OrderId,

    /// Customer who used the voucher, if signed in
    pub user: Option<UserId>,

    /// Date the order was placed
    pub date: Date,
}

/// Voucher
#[derive(Debug, Clone)]
pub struct Voucher<'a> {
    name: String,
    code: String,
    offers: SmallVec<[OfferKey; 2]>,
    usage: VoucherUsage,
    start_date: Date,
    end_date: Date,
    num_basket_additions: u64,
    num_orders: u64,
    total_discount: Option<Money<'a, Currency>>,
    applications: Vec<VoucherApplication>,
}

impl<'a> Voucher<'a> {
    /// Create a new multi use voucher. The code is stored upper-cased.
    pub fn new(
        name: impl Into<String>,
        code: &str,
        offers: impl IntoIterator<Item = OfferKey>,
        start_date: Date,
        end_date: Date,
    ) -> Self {
        Self {
            name: name.into(),
            code: normalise_code(code),
            offers: offers.into_iter().collect(),
            usage: VoucherUsage::default(),
            start_date,
            end_date,
            num_basket_additions: 0,
            num_orders: 0,
            total_discount: None,
            applications: Vec::new(),
        }
    }

    /// Set the usage policy.
    #[must_use]
    pub fn with_usage(mut self, usage: VoucherUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Voucher name, shown to the customer once the code is entered
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upper-cased voucher code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Offers unlocked by this voucher
    pub fn offers(&self) -> &[OfferKey] {
        &self.offers
    }

    /// Usage policy
    pub fn usage(&self) -> VoucherUsage {
        self.usage
    }

    /// First day the voucher is active
    pub fn start_date(&self) -> Date {
        self.start_date
    }

    /// First day the voucher is no longer active
    pub fn end_date(&self) -> Date {
        self.end_date
    }

    /// Number of times the voucher has been added to a basket
    pub fn num_basket_additions(&self) -> u64 {
        self.num_basket_additions
    }

    /// Number of orders placed with this voucher
    pub fn num_orders(&self) -> u64 {
        self.num_orders
    }

    /// Total discount granted through this voucher, if any has been recorded.
    pub fn total_discount(&self) -> Option<Money<'a, Currency>> {
        self.total_discount
    }

    /// Recorded uses of this voucher
    pub fn applications(&self) -> &[VoucherApplication] {
        &self.applications
    }

    /// Check the voucher code and dates.
    ///
    /// # Errors
    ///
    /// Returns a [`VoucherError`] if the code is empty or contains whitespace, or the
    /// start date is after the end date.
    pub fn validate(&self) -> Result<(), VoucherError> {
        if self.code.is_empty() || self.code.chars().any(char::is_whitespace) {
            return Err(VoucherError::InvalidCode(self.code.clone()));
        }

        if self.start_date > self.end_date {
            return Err(VoucherError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        Ok(())
    }

    /// Returns whether the voucher is active on `date`.
    pub fn is_active(&self, date: Date) -> bool {
        self.start_date <= date && date < self.end_date
    }

    /// Check whether `user` may use this voucher. `None` is an anonymous customer.
    ///
    /// # Errors
    ///
    /// Returns the [`Unavailable`] reason when the usage policy forbids it.
    pub fn is_available_to_user(&self, user: Option<UserId>) -> Result<(), Unavailable> {
        match self.usage {
            VoucherUsage::SingleUse if !self.applications.is_empty() => {
                Err(Unavailable::AlreadyUsed)
            }
            VoucherUsage::SingleUse | VoucherUsage::MultiUse => Ok(()),
            VoucherUsage::OncePerCustomer => {
                let user = user.ok_or(Unavailable::SignedInUsersOnly)?;

                if self
                    .applications
                    .iter()
                    .any(|application| application.user == Some(user))
                {
                    return Err(Unavailable::AlreadyUsedByUser);
                }

                Ok(())
            }
        }
    }

    /// Record that the voucher was added to a basket.
    pub fn record_basket_addition(&mut self) {
        self.num_basket_additions += 1;
    }

    /// Record a use of this voucher in a placed order.
    pub fn record_usage(&mut self, order: OrderId, user: Option<UserId>, date: Date) {
        self.applications.push(VoucherApplication { order, user, date });
        self.num_orders += 1;
    }

    /// Accumulate discount granted through this voucher.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError::Money`] if `amount` is in a different currency to previously
    /// recorded discounts.
    pub fn record_discount(&mut self, amount: Money<'a, Currency>) -> Result<(), VoucherError> {
        self.total_discount = Some(match self.total_discount {
            Some(total) => total.add(amount)?,
            None => amount,
        });

        Ok(())
    }
}

/// Vouchers indexed by key and by code.
#[derive(Debug, Default)]
pub struct VoucherSet<'a> {
    vouchers: SlotMap<VoucherKey, Voucher<'a>>,
    codes: FxHashMap<String, VoucherKey>,
}

impl<'a> VoucherSet<'a> {
    /// Create an empty voucher set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a voucher.
    ///
    /// # Errors
    ///
    /// Returns a [`VoucherError`] if the voucher is invalid or its code is already taken.
    pub fn insert(&mut self, voucher: Voucher<'a>) -> Result<VoucherKey, VoucherError> {
        voucher.validate()?;

        if self.codes.contains_key(voucher.code()) {
            return Err(VoucherError::DuplicateCode(voucher.code.clone()));
        }

        let code = voucher.code.clone();
        let key = self.vouchers.insert(voucher);

        self.codes.insert(code, key);

        Ok(key)
    }

    /// Get a voucher by key.
    pub fn get(&self, key: VoucherKey) -> Option<&Voucher<'a>> {
        self.vouchers.get(key)
    }

    /// Get a mutable voucher by key.
    pub fn get_mut(&mut self, key: VoucherKey) -> Option<&mut Voucher<'a>> {
        self.vouchers.get_mut(key)
    }

    /// Find a voucher by code, ignoring case and surrounding whitespace.
    pub fn by_code(&self, code: &str) -> Option<(VoucherKey, &Voucher<'a>)> {
        let key = *self.codes.get(&normalise_code(code))?;

        self.vouchers.get(key).map(|voucher| (key, voucher))
    }

    /// Iterate over every voucher.
    pub fn iter(&self) -> impl Iterator<Item = (VoucherKey, &Voucher<'a>)> {
        self.vouchers.iter()
    }

    /// Number of vouchers
    pub fn len(&self) -> usize {
        self.vouchers.len()
    }

    /// Returns whether the set has no vouchers.
    pub fn is_empty(&self) -> bool {
        self.vouchers.is_empty()
    }

    /// Attach the voucher with `code` to the basket.
    ///
    /// The voucher must be active on `date` and available to `user`.
    ///
    /// # Errors
    ///
    /// Returns a [`VoucherError`] if the code is unknown, the voucher is inactive, or
    /// its usage policy excludes the user.
    pub fn add_to_basket(
        &mut self,
        basket: &mut Basket<'_>,
        code: &str,
        user: Option<UserId>,
        date: Date,
    ) -> Result<VoucherKey, VoucherError> {
        let normalised = normalise_code(code);

        let key = *self
            .codes
            .get(&normalised)
            .ok_or_else(|| VoucherError::UnknownCode(normalised.clone()))?;

        let voucher = self
            .vouchers
            .get_mut(key)
            .ok_or_else(|| VoucherError::UnknownCode(normalised.clone()))?;

        if !voucher.is_active(date) {
            warn!(code = %voucher.code, %date, "voucher is not active");

            return Err(VoucherError::Inactive(voucher.code.clone()));
        }

        if let Err(reason) = voucher.is_available_to_user(user) {
            warn!(code = %voucher.code, %reason, "voucher is unavailable");

            return Err(VoucherError::Unavailable {
                code: voucher.code.clone(),
                reason,
            });
        }

        if basket.add_voucher(key) {
            voucher.record_basket_addition();

            info!(code = %voucher.code, name = %voucher.name, "voucher added to basket");
        } else {
            debug!(code = %voucher.code, "voucher already in basket");
        }

        Ok(key)
    }
}

fn normalise_code(code: &str) -> String {
    code.trim().to_uppercase()
}
