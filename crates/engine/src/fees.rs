//! Platform fee computation.
//!
//! The fee split is computed twice per transaction, once in the payer's
//! currency and once in the pivot currency. The two computations are
//! independent: after rounding they are not guaranteed to be exactly
//! proportional, a drift of a few minor units between them is expected.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    CurrencyCode, CurrencyTable, EngineError, Money, ResultEngine, convert::convert,
    money::round_amount,
};

/// Default platform cut when the configuration has never been edited.
pub const DEFAULT_FEE_PERCENT: Decimal = Decimal::TEN;

/// Platform fee percentage, validated to `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FeePercent(Decimal);

impl FeePercent {
    pub fn new(value: Decimal) -> ResultEngine<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidAmount(format!(
                "fee percent must be between 0 and 100, got {value}"
            )));
        }
        Ok(Self(value.normalize()))
    }

    #[must_use]
    pub fn value(self) -> Decimal {
        self.0
    }
}

impl Default for FeePercent {
    fn default() -> Self {
        Self(DEFAULT_FEE_PERCENT)
    }
}

impl TryFrom<Decimal> for FeePercent {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeePercent> for Decimal {
    fn from(value: FeePercent) -> Self {
        value.0
    }
}

impl FromStr for FeePercent {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim().trim_end_matches('%'))
            .map_err(|_| EngineError::InvalidAmount(format!("invalid fee percent: {s}")))?;
        Self::new(value)
    }
}

impl fmt::Display for FeePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Result of applying a fee to a gross amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub fee: Money,
    pub net: Money,
}

/// `fee = round(amount × pct / 100)`, `net = max(0, amount − fee)`.
#[must_use]
pub fn compute_fee(amount: Money, percent: FeePercent) -> FeeSplit {
    let gross = amount.to_decimal();
    let fee = round_amount(gross * percent.value() / Decimal::ONE_HUNDRED);
    let net = round_amount(gross - fee).max(Decimal::ZERO);
    FeeSplit {
        fee: Money::from_decimal(fee),
        net: Money::from_decimal(net),
    }
}

/// Fee splits of one payment in payer and pivot currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub payer_currency: CurrencyCode,
    pub fee_percent: FeePercent,
    pub amount_paid: Money,
    pub payer_split: FeeSplit,
    pub amount_paid_pivot: Money,
    pub pivot_split: FeeSplit,
}

impl Settlement {
    /// Converts the payment into the pivot currency and splits it twice.
    #[must_use]
    pub fn compute(
        amount_paid: Money,
        payer_currency: &CurrencyCode,
        fee_percent: FeePercent,
        table: &CurrencyTable,
    ) -> Self {
        let amount_paid_pivot = convert(amount_paid, payer_currency, &CurrencyCode::pivot(), table);
        Self::from_amounts(amount_paid, amount_paid_pivot, payer_currency, fee_percent)
    }

    /// Splits already-known payer and pivot amounts (used when the fee is
    /// overridden after the payment was recorded).
    #[must_use]
    pub fn from_amounts(
        amount_paid: Money,
        amount_paid_pivot: Money,
        payer_currency: &CurrencyCode,
        fee_percent: FeePercent,
    ) -> Self {
        Self {
            payer_currency: payer_currency.clone(),
            fee_percent,
            amount_paid,
            payer_split: compute_fee(amount_paid, fee_percent),
            amount_paid_pivot,
            pivot_split: compute_fee(amount_paid_pivot, fee_percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::CurrencyRate;

    fn pct(value: Decimal) -> FeePercent {
        FeePercent::new(value).unwrap()
    }

    fn table() -> CurrencyTable {
        [
            CurrencyRate::new(CurrencyCode::reference(), dec!(1), None).unwrap(),
            CurrencyRate::new(CurrencyCode::pivot(), dec!(0.0075), None).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn ten_percent_of_one_hundred() {
        let split = compute_fee(Money::new(100_00), pct(dec!(10)));
        assert_eq!(split.fee, Money::new(10_00));
        assert_eq!(split.net, Money::new(90_00));
    }

    #[test]
    fn fee_plus_net_equals_amount_for_every_percent() {
        let amounts = [0, 1, 99, 1_00, 33_33, 12_345_67, 99_999_99];
        let mut percent = dec!(0);
        while percent <= dec!(100) {
            for minor in amounts {
                let amount = Money::new(minor);
                let split = compute_fee(amount, pct(percent));
                let diff = (split.fee + split.net - amount).minor().abs();
                assert!(diff <= 1, "{amount} at {percent}%: {split:?}");
                assert!(!split.net.is_negative());
            }
            percent += dec!(2.5);
        }
    }

    #[test]
    fn full_fee_leaves_zero_net() {
        let split = compute_fee(Money::new(55_55), pct(dec!(100)));
        assert_eq!(split.fee, Money::new(55_55));
        assert_eq!(split.net, Money::ZERO);
    }

    #[test]
    fn fee_rounds_half_away_from_zero() {
        // 0.05 * 10% = 0.005 -> 0.01
        let split = compute_fee(Money::new(5), pct(dec!(10)));
        assert_eq!(split.fee, Money::new(1));
        assert_eq!(split.net, Money::new(4));
    }

    #[test]
    fn percent_is_validated() {
        assert!(FeePercent::new(dec!(-0.1)).is_err());
        assert!(FeePercent::new(dec!(100.01)).is_err());
        assert_eq!("12.5%".parse::<FeePercent>().unwrap().value(), dec!(12.5));
        assert!("ten".parse::<FeePercent>().is_err());
    }

    #[test]
    fn settlement_of_one_hundred_usd() {
        let s = Settlement::compute(
            Money::new(100_00),
            &CurrencyCode::reference(),
            pct(dec!(10)),
            &table(),
        );
        assert_eq!(s.payer_split.fee, Money::new(10_00));
        assert_eq!(s.payer_split.net, Money::new(90_00));
        assert_eq!(s.amount_paid_pivot, Money::new(13_333_33));
        assert_eq!(s.pivot_split.fee, Money::new(1_333_33));
        assert_eq!(s.pivot_split.net, Money::new(12_000_00));
    }

    #[test]
    fn payer_and_pivot_splits_drift_by_a_few_minor_units_at_most() {
        let table = table();
        for minor in [1, 7, 33_33, 66_67, 1_234_57, 9_999_99] {
            let s = Settlement::compute(
                Money::new(minor),
                &CurrencyCode::reference(),
                pct(dec!(12.5)),
                &table,
            );
            // Both splits are individually consistent.
            assert!((s.payer_split.fee + s.payer_split.net - s.amount_paid).minor().abs() <= 1);
            assert!(
                (s.pivot_split.fee + s.pivot_split.net - s.amount_paid_pivot)
                    .minor()
                    .abs()
                    <= 1
            );

            // Converting the payer-side net into the pivot currency lands within
            // a few pivot minor units of the independently computed pivot net.
            let converted = convert(
                s.payer_split.net,
                &CurrencyCode::reference(),
                &CurrencyCode::pivot(),
                &table,
            );
            let drift = (converted - s.pivot_split.net).minor().abs();
            // One payer minor unit is worth ~133 pivot minor units at 0.0075.
            assert!(drift <= 134, "drift {drift} for {minor}");
        }
    }
}
