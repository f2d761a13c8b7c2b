//! Teacher payout computation.
//!
//! The payout is derived from the teacher's net amount in the pivot currency.
//! An admin marking a transaction as paid may supply the rate and/or the
//! amount actually sent; blank (absent or zero) fields are filled in by the
//! engine.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, CurrencyTable, Money};

/// Fraction digits kept on auto-derived exchange rates.
pub const RATE_SCALE: u32 = 6;

/// Admin-supplied payout fields. Zero is treated like an absent value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PayoutOverride {
    pub rate: Option<Decimal>,
    pub amount: Option<Money>,
}

impl PayoutOverride {
    fn manual_rate(&self) -> Option<Decimal> {
        self.rate.filter(|rate| *rate > Decimal::ZERO)
    }

    fn manual_amount(&self) -> Option<Money> {
        self.amount.filter(|amount| amount.is_positive())
    }
}

/// Where the payout rate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Supplied by the admin and used verbatim.
    Manual,
    /// Derived from the currency table.
    Auto,
    /// The table had no usable rate; rate 1, amount passed through.
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub rate: Decimal,
    pub amount: Money,
    pub source: RateSource,
}

/// Rounds a rate to [`RATE_SCALE`] places, midpoint away from zero.
#[must_use]
pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `round(amount × rate)`, or `None` when the product overflows.
#[must_use]
pub fn apply_rate(amount: Money, rate: Decimal) -> Option<Money> {
    amount.to_decimal().checked_mul(rate).map(Money::from_decimal)
}

/// Pivot → payout currency rate: `buy(pivot) / sell(payout)`, or `None` when
/// either side is missing or not positive.
#[must_use]
pub fn auto_rate(payout_currency: &CurrencyCode, table: &CurrencyTable) -> Option<Decimal> {
    let pivot = CurrencyCode::pivot();
    if *payout_currency == pivot {
        return Some(Decimal::ONE);
    }
    let buy = table.buy_rate(&pivot).filter(|r| *r > Decimal::ZERO)?;
    let sell = table.sell_rate(payout_currency).filter(|r| *r > Decimal::ZERO)?;
    buy.checked_div(sell).map(round_rate)
}

/// Computes the rate and amount paid to the teacher in `payout_currency`.
///
/// Amount rules, in order:
/// - an explicit positive amount is used as given;
/// - otherwise `round(teacher_amount_pivot × rate)` when the teacher amount
///   is positive;
/// - otherwise zero (a genuinely free payout).
#[must_use]
pub fn compute_payout(
    teacher_amount_pivot: Money,
    payout_currency: &CurrencyCode,
    table: &CurrencyTable,
    overrides: PayoutOverride,
) -> Payout {
    let (rate, source) = match overrides.manual_rate() {
        Some(rate) => (rate, RateSource::Manual),
        None => match auto_rate(payout_currency, table) {
            Some(rate) => (rate, RateSource::Auto),
            None => {
                tracing::warn!(
                    currency = %payout_currency,
                    "no usable payout rate, falling back to 1"
                );
                return Payout {
                    rate: Decimal::ONE,
                    amount: overrides.manual_amount().unwrap_or(teacher_amount_pivot),
                    source: RateSource::Fallback,
                };
            }
        },
    };

    let amount = match overrides.manual_amount() {
        Some(amount) => amount,
        None if teacher_amount_pivot.is_positive() => {
            match apply_rate(teacher_amount_pivot, rate) {
                Some(amount) => amount,
                None => {
                    tracing::warn!(
                        currency = %payout_currency,
                        %rate,
                        "payout overflow, falling back to 1"
                    );
                    return Payout {
                        rate: Decimal::ONE,
                        amount: teacher_amount_pivot,
                        source: RateSource::Fallback,
                    };
                }
            }
        }
        None => Money::ZERO,
    };

    Payout {
        rate,
        amount,
        source,
    }
}
