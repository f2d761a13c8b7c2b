//! Platform-wide configuration: fee percentage, currency rates, country
//! currencies and the company's payment details.
//!
//! The configuration is persisted across a few tables and assembled into a
//! [`PlatformConfig`] snapshot at the start of every operation that needs it.
//! When nothing has been stored yet the engine seeds the tables from the
//! defaults injected through [`EngineBuilder::default_config`].
//!
//! [`EngineBuilder::default_config`]: crate::EngineBuilder::default_config

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CountryCurrencyMap, CurrencyCode, CurrencyRate, CurrencyTable, EngineError, FeePercent,
    ResultEngine, currency::normalize_country_code,
};

pub(crate) mod countries;
pub(crate) mod currency_rates;
pub(crate) mod payment_details;
pub(crate) mod settings;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    pub currency: Option<CurrencyCode>,
}

impl Country {
    pub fn new(code: &str, name: &str, currency: Option<CurrencyCode>) -> ResultEngine<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidCurrency(
                "country name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            code: normalize_country_code(code)?,
            name: name.to_string(),
            currency,
        })
    }
}

/// Where learners send money (bank account, wallet, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetail {
    pub id: Uuid,
    pub method: String,
    pub account_name: String,
    pub account_number: String,
    pub currency: CurrencyCode,
    pub instructions: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform_fee_percent: FeePercent,
    pub currency_rates: CurrencyTable,
    pub country_currency: CountryCurrencyMap,
    pub countries: Vec<Country>,
    pub payment_details: Vec<PaymentDetail>,
}

impl PlatformConfig {
    /// Assembles a configuration, deriving the country → currency map from
    /// `countries`.
    #[must_use]
    pub fn from_parts(
        platform_fee_percent: FeePercent,
        currency_rates: CurrencyTable,
        mut countries: Vec<Country>,
        payment_details: Vec<PaymentDetail>,
    ) -> Self {
        countries.sort_by(|a, b| a.code.cmp(&b.code));
        let mut country_currency = CountryCurrencyMap::default();
        for country in &countries {
            if let Some(currency) = &country.currency
                && let Err(err) = country_currency.insert(&country.code, currency.clone())
            {
                tracing::warn!(
                    country = %country.code,
                    error = %err,
                    "skipping country with invalid code"
                );
            }
        }
        Self {
            platform_fee_percent,
            currency_rates,
            country_currency,
            countries,
            payment_details,
        }
    }

    /// Picks a party's currency: the explicit one if given, else the one
    /// declared for their country, else `fallback`.
    #[must_use]
    pub fn resolve_currency(
        &self,
        explicit: Option<&CurrencyCode>,
        country: Option<&str>,
        fallback: &CurrencyCode,
    ) -> CurrencyCode {
        if let Some(code) = explicit {
            return code.clone();
        }
        country
            .and_then(|c| self.country_currency.currency_for(c))
            .cloned()
            .unwrap_or_else(|| fallback.clone())
    }
}

impl Default for PlatformConfig {
    /// Seed configuration: 10% fee, a handful of currencies quoted against
    /// USD, and their home countries.
    fn default() -> Self {
        let rate = |code: &str, buy: Decimal, sell: Decimal| CurrencyRate {
            code: CurrencyCode(code.to_string()),
            buy_to_usd: buy,
            sell_to_usd: sell,
        };
        let currency_rates: CurrencyTable = [
            rate("USD", Decimal::ONE, Decimal::ONE),
            rate("NPR", Decimal::new(75, 4), Decimal::new(75, 4)),
            rate("INR", Decimal::new(119, 4), Decimal::new(121, 4)),
            rate("EUR", Decimal::new(108, 2), Decimal::new(110, 2)),
            rate("GBP", Decimal::new(126, 2), Decimal::new(128, 2)),
            rate("AUD", Decimal::new(65, 2), Decimal::new(67, 2)),
        ]
        .into_iter()
        .collect();

        let country = |code: &str, name: &str, currency: &str| Country {
            code: code.to_string(),
            name: name.to_string(),
            currency: Some(CurrencyCode(currency.to_string())),
        };
        let countries = vec![
            country("NP", "Nepal", "NPR"),
            country("IN", "India", "INR"),
            country("US", "United States", "USD"),
            country("GB", "United Kingdom", "GBP"),
            country("DE", "Germany", "EUR"),
            country("FR", "France", "EUR"),
            country("AU", "Australia", "AUD"),
        ];

        Self::from_parts(FeePercent::default(), currency_rates, countries, Vec::new())
    }
}
