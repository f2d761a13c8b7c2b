use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{Database, DatabaseConnection};

use migration::MigratorTrait;
use settlement::{
    Country, CurrencyCode, CurrencyRate, Engine, EngineError, FeePercent, Money,
    NewPaymentDetail, PlatformConfig, SessionPayment,
};

async fn connect() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn engine_with_db() -> Engine {
    Engine::builder()
        .database(connect().await)
        .build()
        .await
        .unwrap()
}

fn code(raw: &str) -> CurrencyCode {
    CurrencyCode::parse(raw).unwrap()
}

#[tokio::test]
async fn first_read_seeds_the_defaults() {
    let engine = engine_with_db().await;

    let config = engine.platform_config().await.unwrap();
    let defaults = PlatformConfig::default();
    assert_eq!(config.platform_fee_percent.value(), dec!(10));
    assert_eq!(config.currency_rates, defaults.currency_rates);
    assert_eq!(config.countries, defaults.countries);
    assert_eq!(
        config.country_currency.currency_for("NP"),
        Some(&CurrencyCode::pivot())
    );

    // Reading again does not duplicate anything.
    let again = engine.platform_config().await.unwrap();
    assert_eq!(again.currency_rates.len(), config.currency_rates.len());
}

#[tokio::test]
async fn injected_seed_is_used_on_an_empty_database() {
    let mut seed = PlatformConfig::default();
    seed.platform_fee_percent = FeePercent::new(dec!(15)).unwrap();
    let engine = Engine::builder()
        .database(connect().await)
        .default_config(seed)
        .build()
        .await
        .unwrap();

    let tx = engine
        .create_transaction(
            SessionPayment::new("s-1", "learner", "teacher", Money::new(100_00), Utc::now())
                .currency(code("USD")),
        )
        .await
        .unwrap();
    assert_eq!(tx.platform_fee_percent.value(), dec!(15));
    assert_eq!(tx.platform_fee_amount, Money::new(15_00));
}

#[tokio::test]
async fn fee_change_applies_to_new_transactions_only() {
    let engine = engine_with_db().await;
    let before = engine
        .create_transaction(
            SessionPayment::new("s-1", "learner", "teacher", Money::new(100_00), Utc::now())
                .currency(code("USD")),
        )
        .await
        .unwrap();

    engine
        .set_platform_fee_percent(FeePercent::new(dec!(12.5)).unwrap())
        .await
        .unwrap();
    let after = engine
        .create_transaction(
            SessionPayment::new("s-2", "learner", "teacher", Money::new(100_00), Utc::now())
                .currency(code("USD")),
        )
        .await
        .unwrap();

    assert_eq!(after.platform_fee_amount, Money::new(12_50));
    let before = engine.transaction(before.id).await.unwrap();
    assert_eq!(before.platform_fee_amount, Money::new(10_00));
    assert_eq!(
        engine
            .platform_config()
            .await
            .unwrap()
            .platform_fee_percent
            .value(),
        dec!(12.5)
    );
}

#[tokio::test]
async fn currency_rates_can_be_edited_but_anchors_stay() {
    let engine = engine_with_db().await;

    engine
        .upsert_currency_rate(CurrencyRate::new(code("JPY"), dec!(0.0067), None).unwrap())
        .await
        .unwrap();
    engine
        .upsert_currency_rate(
            CurrencyRate::new(code("EUR"), dec!(1.05), Some(dec!(1.07))).unwrap(),
        )
        .await
        .unwrap();

    let config = engine.platform_config().await.unwrap();
    assert_eq!(config.currency_rates.buy_rate(&code("JPY")), Some(dec!(0.0067)));
    assert_eq!(config.currency_rates.sell_rate(&code("EUR")), Some(dec!(1.07)));

    engine.remove_currency_rate(&code("JPY")).await.unwrap();
    assert!(
        !engine
            .platform_config()
            .await
            .unwrap()
            .currency_rates
            .contains(&code("JPY"))
    );

    assert_eq!(
        engine.remove_currency_rate(&code("JPY")).await.unwrap_err(),
        EngineError::KeyNotFound("currency JPY".to_string())
    );
    for anchor in ["USD", "NPR"] {
        let err = engine.remove_currency_rate(&code(anchor)).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidCurrency(_)));
    }
}

#[tokio::test]
async fn countries_drive_currency_inference() {
    let engine = engine_with_db().await;
    engine
        .set_country(Country::new("jp", "Japan", Some(code("EUR"))).unwrap())
        .await
        .unwrap();

    let tx = engine
        .create_transaction(
            SessionPayment::new("s-1", "learner", "teacher", Money::new(10_00), Utc::now())
                .learner_country("JP"),
        )
        .await
        .unwrap();
    assert_eq!(tx.payer_currency, code("EUR"));

    engine.remove_country("JP").await.unwrap();
    let tx = engine
        .create_transaction(
            SessionPayment::new("s-2", "learner", "teacher", Money::new(10_00), Utc::now())
                .learner_country("JP"),
        )
        .await
        .unwrap();
    assert_eq!(tx.payer_currency, CurrencyCode::pivot());

    assert!(engine.remove_country("JP").await.is_err());
    assert!(Country::new("J1", "Broken", None).is_err());
}

#[tokio::test]
async fn payment_details_are_listed_with_the_config() {
    let engine = engine_with_db().await;

    let detail = engine
        .add_payment_detail(
            NewPaymentDetail::new("bank", "SkillSwap Pvt", "0012-3456", code("NPR"))
                .instructions("Use the session id as reference"),
        )
        .await
        .unwrap();

    let config = engine.platform_config().await.unwrap();
    assert_eq!(config.payment_details, vec![detail.clone()]);

    engine.remove_payment_detail(detail.id).await.unwrap();
    assert!(
        engine
            .platform_config()
            .await
            .unwrap()
            .payment_details
            .is_empty()
    );
    assert!(engine.remove_payment_detail(detail.id).await.is_err());

    let err = engine
        .add_payment_detail(NewPaymentDetail::new(" ", "x", "y", code("NPR")))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
