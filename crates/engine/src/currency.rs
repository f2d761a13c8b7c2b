//! Currency codes, buy/sell rates and the admin-maintained rate table.
//!
//! Every rate is expressed against the reference unit (USD):
//!
//! - `buy_to_usd`: "1 unit of this currency = `buy_to_usd` USD", used when
//!   converting *from* the currency;
//! - `sell_to_usd`: same direction, used when converting *into* the currency.
//!
//! The gap between the two is the platform's bid/ask spread.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Reference unit all rates are quoted against.
pub const REFERENCE_CURRENCY: &str = "USD";

/// Fixed currency used for internal accounting and aggregate reporting.
pub const PIVOT_CURRENCY: &str = "NPR";

/// Upper-case currency code (`USD`, `NPR`, ...).
///
/// Codes are case-insensitive on input and stored upper-case.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(pub(crate) String);

impl CurrencyCode {
    /// Parses and normalizes a currency code (3 to 8 ASCII letters).
    pub fn parse(raw: &str) -> ResultEngine<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if !(3..=8).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::InvalidCurrency(format!(
                "unsupported currency code: {}",
                raw.trim()
            )));
        }
        Ok(Self(code))
    }

    /// The pivot currency (`NPR`).
    #[must_use]
    pub fn pivot() -> Self {
        Self(PIVOT_CURRENCY.to_string())
    }

    /// The reference unit (`USD`).
    #[must_use]
    pub fn reference() -> Self {
        Self(REFERENCE_CURRENCY.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_pivot(&self) -> bool {
        self.0 == PIVOT_CURRENCY
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for CurrencyCode {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

/// Buy/sell pair for one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub code: CurrencyCode,
    pub buy_to_usd: Decimal,
    pub sell_to_usd: Decimal,
}

impl CurrencyRate {
    /// Builds a validated rate. A missing sell rate reuses the buy rate.
    pub fn new(
        code: CurrencyCode,
        buy_to_usd: Decimal,
        sell_to_usd: Option<Decimal>,
    ) -> ResultEngine<Self> {
        let sell_to_usd = sell_to_usd.unwrap_or(buy_to_usd);
        if buy_to_usd <= Decimal::ZERO {
            return Err(EngineError::InvalidRate(format!(
                "buy rate for {code} must be > 0"
            )));
        }
        if sell_to_usd <= Decimal::ZERO {
            return Err(EngineError::InvalidRate(format!(
                "sell rate for {code} must be > 0"
            )));
        }
        Ok(Self {
            code,
            buy_to_usd,
            sell_to_usd,
        })
    }
}

/// Snapshot of the admin-maintained currency rates.
///
/// A table is read once per operation; concurrent admin edits are not
/// observed by a computation already in flight.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTable {
    rates: BTreeMap<CurrencyCode, CurrencyRate>,
}

impl CurrencyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the rate for `rate.code`.
    pub fn upsert(&mut self, rate: CurrencyRate) {
        self.rates.insert(rate.code.clone(), rate);
    }

    /// Removes a rate, returning it if present.
    pub fn remove(&mut self, code: &CurrencyCode) -> Option<CurrencyRate> {
        self.rates.remove(code)
    }

    #[must_use]
    pub fn get(&self, code: &CurrencyCode) -> Option<&CurrencyRate> {
        self.rates.get(code)
    }

    #[must_use]
    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.rates.contains_key(code)
    }

    /// Rate used converting *from* `code` into USD.
    #[must_use]
    pub fn buy_rate(&self, code: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(code).map(|r| r.buy_to_usd)
    }

    /// Rate used converting *into* `code` from USD.
    #[must_use]
    pub fn sell_rate(&self, code: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(code).map(|r| r.sell_to_usd)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CurrencyRate> {
        self.rates.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl FromIterator<CurrencyRate> for CurrencyTable {
    fn from_iter<T: IntoIterator<Item = CurrencyRate>>(iter: T) -> Self {
        let mut table = Self::new();
        for rate in iter {
            table.upsert(rate);
        }
        table
    }
}

/// Upper-case ISO country code (`NP`, `US`, ...).
pub(crate) fn normalize_country_code(raw: &str) -> ResultEngine<String> {
    let code = raw.trim().to_ascii_uppercase();
    if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EngineError::InvalidCurrency(format!(
            "invalid country code: {}",
            raw.trim()
        )));
    }
    Ok(code)
}

/// Country → currency fallback used when a party has no explicit currency.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCurrencyMap {
    entries: BTreeMap<String, CurrencyCode>,
}

impl CountryCurrencyMap {
    pub fn insert(&mut self, country: &str, currency: CurrencyCode) -> ResultEngine<()> {
        let country = normalize_country_code(country)?;
        self.entries.insert(country, currency);
        Ok(())
    }

    /// Currency declared for `country`, if any. Unknown or malformed codes
    /// resolve to `None`.
    #[must_use]
    pub fn currency_for(&self, country: &str) -> Option<&CurrencyCode> {
        let country = normalize_country_code(country).ok()?;
        self.entries.get(&country)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CurrencyCode)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
