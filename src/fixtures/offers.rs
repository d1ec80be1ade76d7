//! Offer Fixtures

use std::{collections::BTreeMap, str::FromStr};

use decimal_percentage::Percentage;
use jiff::civil::Date;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;

use crate::{
    benefits::Benefit,
    conditions::Condition,
    fixtures::{FixtureError, products::parse_price},
    offers::{ConditionalOffer, OfferType},
    ranges::Range,
};

/// Wrapper for offers in YAML
///
/// Offers are kept in key order so offers of equal priority apply in a stable order.
#[derive(Debug, Deserialize)]
pub struct OffersFixture {
    /// Map of offer key -> offer fixture
    pub offers: BTreeMap<String, OfferFixture>,
}

/// Offer fixture from YAML
#[derive(Debug, Deserialize)]
pub struct OfferFixture {
    /// Offer name
    pub name: String,

    /// Offer description
    #[serde(default)]
    pub description: String,

    /// Offer type, `site` unless given
    #[serde(default)]
    pub offer_type: OfferType,

    /// Priority, higher first
    #[serde(default)]
    pub priority: i32,

    /// First day the offer is active (e.g., "2024-01-01")
    pub start_date: String,

    /// First day the offer is no longer active
    pub end_date: String,

    /// Eligibility condition
    pub condition: ConditionFixture,

    /// Granted benefit
    pub benefit: BenefitFixture,
}

/// Condition configuration from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionFixture {
    /// At least `value` units from the range
    Count {
        /// Range key
        range: String,

        /// Number of units
        value: u32,
    },

    /// Units from the range worth at least `value`
    Value {
        /// Range key
        range: String,

        /// Price string (e.g., "10.00 GBP")
        value: String,
    },

    /// At least `value` distinct products from the range
    Coverage {
        /// Range key
        range: String,

        /// Number of distinct products
        value: u32,
    },
}

/// Benefit configuration from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenefitFixture {
    /// Percentage off each affected unit
    Percentage {
        /// Range key
        range: String,

        /// Percentage string (e.g., "15%" or "0.15")
        value: String,

        /// Cap on affected units
        #[serde(default)]
        max_affected_items: Option<u32>,
    },

    /// Fixed amount off across affected units
    Absolute {
        /// Range key
        range: String,

        /// Price string (e.g., "5.00 GBP")
        value: String,

        /// Cap on affected units
        #[serde(default)]
        max_affected_items: Option<u32>,
    },

    /// Cheapest unit free
    Multibuy {
        /// Range key
        range: String,
    },

    /// Condition units for a fixed total
    FixedPrice {
        /// Range key
        range: String,

        /// Price string (e.g., "10.00 GBP")
        value: String,
    },
}

impl OfferFixture {
    /// Resolve ranges and build the offer.
    ///
    /// # Errors
    ///
    /// Returns an error if a range is not loaded, or a price, percentage or date is invalid.
    pub fn try_into_offer(
        self,
        ranges: &FxHashMap<String, Range>,
    ) -> Result<ConditionalOffer<'static>, FixtureError> {
        let condition = self.condition.try_into_condition(ranges)?;
        let benefit = self.benefit.try_into_benefit(ranges)?;

        let offer = ConditionalOffer::new(
            self.name,
            condition,
            benefit,
            parse_date(&self.start_date)?,
            parse_date(&self.end_date)?,
        )
        .with_description(self.description)
        .with_offer_type(self.offer_type)
        .with_priority(self.priority);

        offer.validate()?;

        Ok(offer)
    }
}

impl ConditionFixture {
    fn try_into_condition(
        self,
        ranges: &FxHashMap<String, Range>,
    ) -> Result<Condition<'static>, FixtureError> {
        Ok(match self {
            ConditionFixture::Count { range, value } => {
                Condition::count(lookup_range(ranges, &range)?, value)
            }
            ConditionFixture::Value { range, value } => {
                Condition::value(lookup_range(ranges, &range)?, parse_money(&value)?)
            }
            ConditionFixture::Coverage { range, value } => {
                Condition::coverage(lookup_range(ranges, &range)?, value)
            }
        })
    }
}

impl BenefitFixture {
    fn try_into_benefit(
        self,
        ranges: &FxHashMap<String, Range>,
    ) -> Result<Benefit<'static>, FixtureError> {
        let benefit = match self {
            BenefitFixture::Percentage {
                range,
                value,
                max_affected_items,
            } => {
                let mut benefit =
                    Benefit::percentage(lookup_range(ranges, &range)?, parse_percentage(&value)?);

                benefit.set_max_affected_items(max_affected_items);
                benefit
            }
            BenefitFixture::Absolute {
                range,
                value,
                max_affected_items,
            } => {
                let mut benefit =
                    Benefit::absolute(lookup_range(ranges, &range)?, parse_money(&value)?);

                benefit.set_max_affected_items(max_affected_items);
                benefit
            }
            BenefitFixture::Multibuy { range } => Benefit::multibuy(lookup_range(ranges, &range)?),
            BenefitFixture::FixedPrice { range, value } => {
                Benefit::fixed_price(lookup_range(ranges, &range)?, parse_money(&value)?)
            }
        };

        Ok(benefit)
    }
}

/// Parse a percentage string, either "15%" or a fraction such as "0.15".
///
/// # Errors
///
/// Returns an error if the value is not a number between 0% and 100%.
pub fn parse_percentage(value: &str) -> Result<Percentage, FixtureError> {
    let trimmed = value.trim();

    let fraction = match trimmed.strip_suffix('%') {
        Some(points) => Decimal::from_str(points.trim())
            .ok()
            .and_then(|points| points.checked_div(Decimal::ONE_HUNDRED)),
        None => Decimal::from_str(trimmed).ok(),
    }
    .filter(|fraction| *fraction >= Decimal::ZERO && *fraction <= Decimal::ONE)
    .ok_or_else(|| FixtureError::InvalidPercentage(value.to_string()))?;

    Ok(Percentage::from(fraction))
}

/// Parse an ISO 8601 civil date (e.g., "2024-01-31").
///
/// # Errors
///
/// Returns [`FixtureError::InvalidDate`] if the value is not a valid date.
pub fn parse_date(value: &str) -> Result<Date, FixtureError> {
    value
        .trim()
        .parse()
        .map_err(|_err| FixtureError::InvalidDate(value.to_string()))
}

fn parse_money(value: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let (minor_units, currency) = parse_price(value)?;

    Ok(Money::from_minor(minor_units, currency))
}

fn lookup_range(ranges: &FxHashMap<String, Range>, key: &str) -> Result<Range, FixtureError> {
    ranges
        .get(key)
        .cloned()
        .ok_or_else(|| FixtureError::RangeNotFound(key.to_string()))
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use testresult::TestResult;

    use crate::{benefits::BenefitKind, conditions::ConditionKind};

    use super::*;

    fn ranges() -> FxHashMap<String, Range> {
        let mut ranges = FxHashMap::default();

        ranges.insert("all".to_string(), Range::all_products("All products"));

        ranges
    }

    #[test]
    fn parse_percentage_accepts_points_and_fractions() -> TestResult {
        let from_points = parse_percentage("15%")? * Decimal::ONE;
        let from_fraction = parse_percentage("0.15")? * Decimal::ONE;

        assert_eq!(from_points, Decimal::new(15, 2));
        assert_eq!(from_fraction, Decimal::new(15, 2));

        Ok(())
    }

    #[test]
    fn parse_percentage_rejects_out_of_range_values() {
        assert!(matches!(parse_percentage("150%"), Err(FixtureError::InvalidPercentage(_))));
        assert!(matches!(parse_percentage("-0.1"), Err(FixtureError::InvalidPercentage(_))));
        assert!(matches!(parse_percentage("lots"), Err(FixtureError::InvalidPercentage(_))));
    }

    #[test]
    fn parse_date_reads_iso_dates() -> TestResult {
        assert_eq!(parse_date("2011-01-10")?, date(2011, 1, 10));
        assert!(matches!(parse_date("2011-02-30"), Err(FixtureError::InvalidDate(_))));

        Ok(())
    }

    #[test]
    fn offer_fixture_builds_offer() -> TestResult {
        let fixture: OfferFixture = serde_norway::from_str(
            r#"
name: Spend £10, save 15%
offer_type: voucher
priority: 3
start_date: 2011-01-01
end_date: 2011-02-01
condition:
  type: value
  range: all
  value: 10.00 GBP
benefit:
  type: percentage
  range: all
  value: 15%
  max_affected_items: 2
"#,
        )?;

        let offer = fixture.try_into_offer(&ranges())?;

        assert_eq!(offer.name(), "Spend £10, save 15%");
        assert_eq!(offer.offer_type(), OfferType::Voucher);
        assert_eq!(offer.priority(), 3);
        assert!(offer.is_active(date(2011, 1, 10)));
        assert!(matches!(offer.condition().kind(), ConditionKind::Value(_)));
        assert!(matches!(offer.benefit().kind(), BenefitKind::Percentage(_)));
        assert_eq!(offer.benefit().max_affected_items(), Some(2));

        Ok(())
    }

    #[test]
    fn offer_fixture_rejects_unknown_range() -> TestResult {
        let fixture: OfferFixture = serde_norway::from_str(
            r"
name: Missing range
start_date: 2011-01-01
end_date: 2011-02-01
condition: { type: count, range: books, value: 3 }
benefit: { type: multibuy, range: books }
",
        )?;

        assert!(matches!(
            fixture.try_into_offer(&ranges()),
            Err(FixtureError::RangeNotFound(range)) if range == "books"
        ));

        Ok(())
    }

    #[test]
    fn offer_fixture_rejects_inverted_dates() -> TestResult {
        let fixture: OfferFixture = serde_norway::from_str(
            r"
name: Backwards
start_date: 2011-02-01
end_date: 2011-01-01
condition: { type: count, range: all, value: 1 }
benefit: { type: multibuy, range: all }
",
        )?;

        assert!(matches!(
            fixture.try_into_offer(&ranges()),
            Err(FixtureError::Offer(_))
        ));

        Ok(())
    }
}
