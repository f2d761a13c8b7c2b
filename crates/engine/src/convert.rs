//! Currency conversion through the reference unit.
//!
//! `amount × buy(from)` gives USD at full precision, dividing by `sell(to)`
//! gives the destination amount, which is rounded once at the end.
//!
//! Conversion never fails. An unknown source currency converts at 1 and a
//! missing or zero destination sell rate yields 0, so a payment record can
//! always be produced and an admin can spot and correct the number.

use rust_decimal::Decimal;

use crate::{CurrencyCode, CurrencyTable, Money};

/// Converts `amount` from `from` into `to` using the table's buy/sell rates.
#[must_use]
pub fn convert(amount: Money, from: &CurrencyCode, to: &CurrencyCode, table: &CurrencyTable) -> Money {
    if from == to {
        return amount;
    }
    Money::from_decimal(convert_decimal(amount.to_decimal(), from, to, table))
}

/// Unrounded conversion.
pub(crate) fn convert_decimal(
    amount: Decimal,
    from: &CurrencyCode,
    to: &CurrencyCode,
    table: &CurrencyTable,
) -> Decimal {
    let buy = match table.buy_rate(from) {
        Some(rate) if rate > Decimal::ZERO => rate,
        _ => {
            tracing::warn!(currency = %from, "missing buy rate, converting at 1");
            Decimal::ONE
        }
    };
    let Some(usd) = amount.checked_mul(buy) else {
        tracing::warn!(currency = %from, "conversion overflow, yielding 0");
        return Decimal::ZERO;
    };

    match table.sell_rate(to) {
        Some(rate) if rate > Decimal::ZERO => usd.checked_div(rate).unwrap_or_else(|| {
            tracing::warn!(currency = %to, "conversion overflow, yielding 0");
            Decimal::ZERO
        }),
        _ => {
            tracing::warn!(currency = %to, "missing sell rate, conversion yields 0");
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::CurrencyRate;

    fn code(raw: &str) -> CurrencyCode {
        CurrencyCode::parse(raw).unwrap()
    }

    fn table() -> CurrencyTable {
        [
            CurrencyRate::new(code("USD"), dec!(1), None).unwrap(),
            CurrencyRate::new(code("NPR"), dec!(0.0075), None).unwrap(),
            CurrencyRate::new(code("INR"), dec!(0.0120), Some(dec!(0.0125))).unwrap(),
            CurrencyRate::new(code("EUR"), dec!(1.08), Some(dec!(1.10))).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn usd_to_npr_uses_pivot_sell_rate() {
        let npr = convert(Money::new(100_00), &code("USD"), &code("NPR"), &table());
        assert_eq!(npr, Money::new(13_333_33));
    }

    #[test]
    fn source_uses_buy_and_destination_uses_sell() {
        // 100 EUR * 1.08 = 108 USD; 108 / 0.0125 = 8640 INR
        let inr = convert(Money::new(100_00), &code("EUR"), &code("INR"), &table());
        assert_eq!(inr, Money::new(8_640_00));
    }

    #[test]
    fn same_currency_is_identity() {
        let amount = Money::new(42_42);
        assert_eq!(convert(amount, &code("EUR"), &code("EUR"), &table()), amount);
    }

    #[test]
    fn unknown_source_converts_at_one() {
        // 10 XYZ treated as 10 USD -> 10 / 1.10 EUR
        let eur = convert(Money::new(10_00), &code("XYZ"), &code("EUR"), &table());
        assert_eq!(eur, Money::new(9_09));
    }

    #[test]
    fn missing_or_zero_sell_rate_yields_zero() {
        let out = convert(Money::new(10_00), &code("USD"), &code("ABC"), &table());
        assert_eq!(out, Money::ZERO);
    }

    #[test]
    fn rounding_happens_once_at_the_end() {
        // 0.01 USD -> 1.333.. NPR -> 1.33; intermediate kept at full precision
        let out = convert(Money::new(1), &code("USD"), &code("NPR"), &table());
        assert_eq!(out, Money::new(1_33));
    }

    #[test]
    fn round_trip_stays_within_spread_bound() {
        let table = table();
        let pairs = [("EUR", "INR"), ("USD", "NPR"), ("INR", "NPR"), ("EUR", "USD")];
        for (a, b) in pairs {
            let (a, b) = (code(a), code(b));
            for minor in [1_00, 99_99, 12_345_67] {
                let x = Money::new(minor);
                let there = convert(x, &a, &b, &table);
                let back = convert(there, &b, &a, &table);

                // Expected factor of a full round trip: buy(a)/sell(b) * buy(b)/sell(a).
                let factor = table.buy_rate(&a).unwrap() / table.sell_rate(&b).unwrap()
                    * table.buy_rate(&b).unwrap()
                    / table.sell_rate(&a).unwrap();
                let expected = x.to_decimal() * factor;

                // Two roundings; the first is amplified by the return leg.
                let back_factor = table.buy_rate(&b).unwrap() / table.sell_rate(&a).unwrap();
                let tolerance = dec!(0.005) * back_factor + dec!(0.005);
                let diff = (back.to_decimal() - expected).abs();
                assert!(
                    diff <= tolerance,
                    "{a}->{b}->{a} of {x}: got {back}, expected {expected} (tol {tolerance})"
                );
                assert!(factor <= Decimal::ONE, "spread must never create money");
            }
        }
    }

    #[test]
    fn overflowing_conversion_yields_zero() {
        let mut table = table();
        table.upsert(CurrencyRate::new(code("ZWL"), dec!(1000000000000000), None).unwrap());
        let out = convert(Money::new(i64::MAX / 2), &code("ZWL"), &code("USD"), &table);
        assert_eq!(out, Money::ZERO);
    }
}
