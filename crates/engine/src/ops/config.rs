use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryOrder, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    Country, CurrencyCode, CurrencyRate, CurrencyTable, EngineError, FeePercent, NewPaymentDetail,
    PaymentDetail, PlatformConfig, ResultEngine,
    platform_config::{countries, currency_rates, payment_details, settings},
    util::{normalize_optional_text, normalize_required, parse_decimal},
};

use super::{Engine, with_tx};

impl Engine {
    /// Reads the platform configuration, seeding it from the builder's
    /// default on first use.
    pub async fn platform_config(&self) -> ResultEngine<PlatformConfig> {
        with_tx!(self, |db_tx| self.load_config(&db_tx).await)
    }

    pub async fn set_platform_fee_percent(&self, fee_percent: FeePercent) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.ensure_config_seeded(&db_tx).await?;
            let active = settings::ActiveModel {
                id: ActiveValue::Set(settings::SINGLETON_ID),
                platform_fee_percent: ActiveValue::Set(fee_percent.value().to_string()),
                updated_at: ActiveValue::Set(Utc::now()),
            };
            active.update(&db_tx).await?;
            tracing::info!(fee_percent = %fee_percent, "platform fee updated");
            Ok(())
        })
    }

    /// Inserts or replaces the buy/sell pair of one currency.
    pub async fn upsert_currency_rate(&self, rate: CurrencyRate) -> ResultEngine<()> {
        let rate = CurrencyRate::new(rate.code, rate.buy_to_usd, Some(rate.sell_to_usd))?;
        with_tx!(self, |db_tx| {
            self.ensure_config_seeded(&db_tx).await?;
            currency_rates::Entity::insert(currency_rates::ActiveModel::from(&rate))
                .on_conflict(
                    OnConflict::column(currency_rates::Column::Code)
                        .update_columns([
                            currency_rates::Column::BuyToUsd,
                            currency_rates::Column::SellToUsd,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;
            tracing::info!(
                currency = %rate.code,
                buy = %rate.buy_to_usd,
                sell = %rate.sell_to_usd,
                "currency rate saved"
            );
            Ok(())
        })
    }

    /// Removes a currency. The reference and pivot currencies cannot be
    /// removed.
    pub async fn remove_currency_rate(&self, code: &CurrencyCode) -> ResultEngine<()> {
        if code.is_pivot() || *code == CurrencyCode::reference() {
            return Err(EngineError::InvalidCurrency(format!(
                "{code} cannot be removed"
            )));
        }
        with_tx!(self, |db_tx| {
            self.ensure_config_seeded(&db_tx).await?;
            let result = currency_rates::Entity::delete_by_id(code.to_string())
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound(format!("currency {code}")));
            }
            Ok(())
        })
    }

    /// Inserts or replaces a country and its default currency.
    pub async fn set_country(&self, country: Country) -> ResultEngine<()> {
        let country = Country::new(&country.code, &country.name, country.currency)?;
        with_tx!(self, |db_tx| {
            self.ensure_config_seeded(&db_tx).await?;
            countries::Entity::insert(countries::ActiveModel::from(&country))
                .on_conflict(
                    OnConflict::column(countries::Column::Code)
                        .update_columns([countries::Column::Name, countries::Column::CurrencyCode])
                        .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;
            Ok(())
        })
    }

    pub async fn remove_country(&self, code: &str) -> ResultEngine<()> {
        let code = crate::currency::normalize_country_code(code)?;
        with_tx!(self, |db_tx| {
            self.ensure_config_seeded(&db_tx).await?;
            let result = countries::Entity::delete_by_id(code.clone())
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound(format!("country {code}")));
            }
            Ok(())
        })
    }

    pub async fn add_payment_detail(&self, cmd: NewPaymentDetail) -> ResultEngine<PaymentDetail> {
        let detail = PaymentDetail {
            id: Uuid::new_v4(),
            method: normalize_required(&cmd.method, "payment method")?,
            account_name: normalize_required(&cmd.account_name, "account name")?,
            account_number: normalize_required(&cmd.account_number, "account number")?,
            currency: cmd.currency,
            instructions: normalize_optional_text(cmd.instructions.as_deref()),
        };
        with_tx!(self, |db_tx| {
            self.ensure_config_seeded(&db_tx).await?;
            payment_details::ActiveModel::from(&detail)
                .insert(&db_tx)
                .await?;
            Ok(detail)
        })
    }

    pub async fn remove_payment_detail(&self, id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let result = payment_details::Entity::delete_by_id(id.to_string())
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound("payment detail not found".to_string()));
            }
            Ok(())
        })
    }

    /// Snapshot of the configuration used by one operation.
    pub(super) async fn load_config<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> ResultEngine<PlatformConfig> {
        let settings_model = self.ensure_config_seeded(db).await?;
        let fee_percent = FeePercent::new(parse_decimal(
            &settings_model.platform_fee_percent,
            "fee percent",
        )?)?;

        let rates: CurrencyTable = currency_rates::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(CurrencyRate::try_from)
            .collect::<ResultEngine<_>>()?;
        let country_list = countries::Entity::find()
            .order_by_asc(countries::Column::Code)
            .all(db)
            .await?
            .into_iter()
            .map(Country::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        let details = payment_details::Entity::find()
            .order_by_asc(payment_details::Column::Method)
            .order_by_asc(payment_details::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(PaymentDetail::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(PlatformConfig::from_parts(
            fee_percent,
            rates,
            country_list,
            details,
        ))
    }

    /// Returns the settings row, creating it and the seed rates, countries
    /// and payment details when it does not exist yet.
    async fn ensure_config_seeded<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> ResultEngine<settings::Model> {
        if let Some(model) = settings::Entity::find_by_id(settings::SINGLETON_ID)
            .one(db)
            .await?
        {
            return Ok(model);
        }

        let seed = &self.default_config;
        let inserted = settings::Entity::insert(settings::ActiveModel {
            id: ActiveValue::Set(settings::SINGLETON_ID),
            platform_fee_percent: ActiveValue::Set(seed.platform_fee_percent.value().to_string()),
            updated_at: ActiveValue::Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::column(settings::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

        // Another request seeded first; its rows win.
        if inserted > 0 {
            for rate in seed.currency_rates.iter() {
                currency_rates::ActiveModel::from(rate).insert(db).await?;
            }
            for country in &seed.countries {
                countries::ActiveModel::from(country).insert(db).await?;
            }
            for detail in &seed.payment_details {
                payment_details::ActiveModel::from(detail).insert(db).await?;
            }
            tracing::info!(
                currencies = seed.currency_rates.len(),
                countries = seed.countries.len(),
                "platform config seeded"
            );
        }

        settings::Entity::find_by_id(settings::SINGLETON_ID)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("platform settings".to_string()))
    }
}
