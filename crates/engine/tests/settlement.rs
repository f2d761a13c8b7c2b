use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::Database;

use migration::MigratorTrait;
use settlement::{
    CollaboratorError, CurrencyCode, Engine, EngineError, EventKind, FeePercent, MarkPaidCmd,
    Money, Notifier, RateCorrectionCmd, RevertCmd, SessionPayment, SettlementEvent,
    TransactionListFilter, TransactionStatus,
};

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<SettlementEvent>>,
}

impl RecordingNotifier {
    fn kinds(&self) -> Vec<(EventKind, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.kind, e.user_id.clone()))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &SettlementEvent) -> Result<(), CollaboratorError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &SettlementEvent) -> Result<(), CollaboratorError> {
        Err("mail server down".into())
    }
}

async fn engine_with_file_db() -> (Engine, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("settlement_{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    (engine, path)
}

async fn engine_with_notifier() -> (Engine, Arc<RecordingNotifier>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::builder()
        .database(db)
        .notifier(notifier.clone())
        .build()
        .await
        .unwrap();
    (engine, notifier)
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 10, 0, 0).unwrap()
}

fn code(raw: &str) -> CurrencyCode {
    CurrencyCode::parse(raw).unwrap()
}

fn usd_payment(session: &str, amount: i64) -> SessionPayment {
    SessionPayment::new(session, "learner-1", "teacher-1", Money::new(amount), at(1))
        .currency(code("USD"))
}

#[tokio::test]
async fn usd_payment_is_split_in_payer_and_pivot_currency() {
    let (engine, notifier) = engine_with_notifier().await;

    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();

    assert_eq!(tx.status, TransactionStatus::PendingPayout);
    assert_eq!(tx.payer_currency, code("USD"));
    assert_eq!(tx.payout_currency, code("USD"));
    assert_eq!(tx.amount_paid, Money::new(100_00));
    assert_eq!(tx.platform_fee_amount, Money::new(10_00));
    assert_eq!(tx.teacher_amount, Money::new(90_00));
    assert_eq!(tx.amount_paid_npr, Money::new(13_333_33));
    assert_eq!(tx.platform_fee_amount_npr, Money::new(1_333_33));
    assert_eq!(tx.teacher_amount_npr, Money::new(12_000_00));
    assert_eq!(tx.paid_at, Some(at(1)));
    assert_eq!(tx.payout_amount, None);
    assert_eq!(
        notifier.kinds(),
        vec![(EventKind::PaymentDone, "teacher-1".to_string())]
    );
}

#[tokio::test]
async fn create_is_idempotent_per_session() {
    let (engine, notifier) = engine_with_notifier().await;

    let first = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();
    let second = engine
        .create_transaction(usd_payment("session-1", 250_00))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.amount_paid, Money::new(100_00));
    assert_eq!(notifier.kinds().len(), 1);

    let (all, _) = engine
        .list_transactions(&TransactionListFilter::default(), 10, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn free_session_is_settled_immediately() {
    let (engine, notifier) = engine_with_notifier().await;

    let tx = engine
        .create_transaction(
            SessionPayment::new("free-1", "learner-1", "teacher-1", Money::new(40_00), at(2))
                .free(),
        )
        .await
        .unwrap();

    assert_eq!(tx.status, TransactionStatus::PaidToTeacher);
    assert_eq!(tx.amount_paid, Money::ZERO);
    assert_eq!(tx.teacher_amount_npr, Money::ZERO);
    assert_eq!(tx.payout_amount, Some(Money::ZERO));
    assert_eq!(tx.exchange_rate, None);
    assert_eq!(tx.paid_to_teacher_at, Some(at(2)));
    assert!(notifier.kinds().is_empty());

    let err = engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin", at(3)))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn currencies_are_inferred_from_countries() {
    let (engine, _) = engine_with_notifier().await;

    let tx = engine
        .create_transaction(
            SessionPayment::new("session-in", "learner-1", "teacher-1", Money::new(1_000_00), at(1))
                .learner_country("in")
                .teacher_country("NP"),
        )
        .await
        .unwrap();
    assert_eq!(tx.payer_currency, code("INR"));
    assert_eq!(tx.payout_currency, code("NPR"));
    // 1000 INR × 0.0119 / 0.0075
    assert_eq!(tx.amount_paid_npr, Money::new(1_586_67));
    assert_eq!(tx.teacher_amount_npr, Money::new(1_428_00));

    let paid = engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin", at(2)))
        .await
        .unwrap();
    assert_eq!(paid.exchange_rate, Some(dec!(1)));
    assert_eq!(paid.payout_amount, Some(Money::new(1_428_00)));

    let unknown = engine
        .create_transaction(
            SessionPayment::new("session-zz", "learner-1", "teacher-1", Money::new(10_00), at(1))
                .learner_country("ZZ"),
        )
        .await
        .unwrap();
    assert_eq!(unknown.payer_currency, CurrencyCode::pivot());
    assert_eq!(unknown.payout_currency, CurrencyCode::pivot());
}

#[tokio::test]
async fn invalid_payment_input_is_rejected() {
    let (engine, _) = engine_with_notifier().await;

    let err = engine
        .create_transaction(usd_payment("session-1", -1))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("amount must be >= 0".to_string())
    );

    let err = engine
        .create_transaction(usd_payment("   ", 10_00))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn mark_paid_computes_payout_and_records_history() {
    let (engine, notifier) = engine_with_notifier().await;
    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();

    let paid = engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin-1", at(5)).note("wired"))
        .await
        .unwrap();

    assert_eq!(paid.status, TransactionStatus::PaidToTeacher);
    assert_eq!(paid.exchange_rate, Some(dec!(0.0075)));
    assert_eq!(paid.payout_amount, Some(Money::new(90_00)));
    assert_eq!(paid.paid_to_teacher_at, Some(at(5)));
    assert_eq!(paid.note.as_deref(), Some("wired"));
    assert_eq!(paid.exchange_rate_history.len(), 1);
    let entry = &paid.exchange_rate_history[0];
    assert_eq!(entry.seq, 1);
    assert_eq!(entry.rate, dec!(0.0075));
    assert_eq!(entry.payout_amount, Money::new(90_00));
    assert_eq!(entry.admin_id, "admin-1");

    assert_eq!(
        notifier.kinds().last(),
        Some(&(EventKind::PayoutReceived, "teacher-1".to_string()))
    );

    let err = engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin-1", at(6)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Conflict("already paid to teacher (status: paid_to_teacher)".to_string())
    );
    assert_eq!(engine.rate_history(tx.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn mark_paid_honours_admin_overrides() {
    let (engine, _) = engine_with_notifier().await;
    let manual = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();
    let fee = engine
        .create_transaction(usd_payment("session-2", 100_00))
        .await
        .unwrap();

    let paid = engine
        .mark_paid(
            manual.id,
            MarkPaidCmd::new("admin", at(2))
                .rate(dec!(0.0074))
                .amount(Money::new(88_50)),
        )
        .await
        .unwrap();
    assert_eq!(paid.exchange_rate, Some(dec!(0.0074)));
    assert_eq!(paid.payout_amount, Some(Money::new(88_50)));

    let paid = engine
        .mark_paid(
            fee.id,
            MarkPaidCmd::new("admin", at(2)).fee_percent(FeePercent::new(dec!(20)).unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(paid.platform_fee_percent.value(), dec!(20));
    assert_eq!(paid.platform_fee_amount, Money::new(20_00));
    assert_eq!(paid.teacher_amount, Money::new(80_00));
    assert_eq!(paid.teacher_amount_npr, Money::new(10_666_66));
    // 10666.66 × 0.0075 = 79.99995
    assert_eq!(paid.payout_amount, Some(Money::new(80_00)));

    let err = engine
        .mark_paid(manual.id, MarkPaidCmd::new("admin", at(2)).rate(dec!(-1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRate(_)));
}

#[tokio::test]
async fn revert_clamps_deduction_and_is_final() {
    let (engine, notifier) = engine_with_notifier().await;
    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();

    let reverted = engine
        .revert(
            tx.id,
            RevertCmd::new("admin", at(3))
                .deduction(Money::new(150_00))
                .note("no-show"),
        )
        .await
        .unwrap();
    assert_eq!(reverted.status, TransactionStatus::RevertedToLearner);
    assert_eq!(reverted.revert_deduction_amount, Some(Money::new(100_00)));
    assert_eq!(reverted.revert_refund_amount, Some(Money::ZERO));
    assert_eq!(reverted.reverted_at, Some(at(3)));
    assert_eq!(
        notifier.kinds().last(),
        Some(&(EventKind::PaymentReverted, "learner-1".to_string()))
    );

    let err = engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin", at(4)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Conflict(
            "already reverted to learner (status: reverted_to_learner)".to_string()
        )
    );
}

#[tokio::test]
async fn revert_defaults_to_full_refund_and_rejects_settled() {
    let (engine, _) = engine_with_notifier().await;
    let pending = engine
        .create_transaction(usd_payment("session-1", 60_00))
        .await
        .unwrap();
    let settled = engine
        .create_transaction(usd_payment("session-2", 60_00))
        .await
        .unwrap();
    let settled = engine
        .mark_paid(settled.id, MarkPaidCmd::new("admin", at(2)))
        .await
        .unwrap();

    let reverted = engine
        .revert(pending.id, RevertCmd::new("admin", at(3)))
        .await
        .unwrap();
    assert_eq!(reverted.revert_deduction_amount, Some(Money::ZERO));
    assert_eq!(reverted.revert_refund_amount, Some(Money::new(60_00)));

    let err = engine
        .revert(
            settled.id,
            RevertCmd::new("admin", at(3)).deduction(Money::new(5_00)),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Conflict("already paid to teacher (status: paid_to_teacher)".to_string())
    );
    assert_eq!(engine.transaction(settled.id).await.unwrap(), settled);
}

#[tokio::test]
async fn rate_corrections_append_to_history_only() {
    let (engine, _) = engine_with_notifier().await;
    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();

    let err = engine
        .record_rate_correction(tx.id, RateCorrectionCmd::new("admin", dec!(0.0076), at(2)))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin", at(2)))
        .await
        .unwrap();
    let entry = engine
        .record_rate_correction(
            tx.id,
            RateCorrectionCmd::new("auditor", dec!(0.0076), at(3)).note("bank rate"),
        )
        .await
        .unwrap();
    assert_eq!(entry.seq, 2);
    assert_eq!(entry.payout_amount, Money::new(91_20));
    assert_eq!(entry.note.as_deref(), Some("bank rate"));

    let tx = engine.transaction(tx.id).await.unwrap();
    assert_eq!(tx.exchange_rate, Some(dec!(0.0075)));
    assert_eq!(tx.payout_amount, Some(Money::new(90_00)));
    let seqs: Vec<i32> = tx.exchange_rate_history.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2]);

    let err = engine
        .record_rate_correction(tx.id, RateCorrectionCmd::new("admin", dec!(0), at(4)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRate(_)));
}

#[tokio::test]
async fn failing_notifier_does_not_fail_the_operation() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .notifier(Arc::new(FailingNotifier))
        .build()
        .await
        .unwrap();

    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();
    let paid = engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin", at(2)))
        .await
        .unwrap();
    assert_eq!(paid.status, TransactionStatus::PaidToTeacher);
}

#[tokio::test]
async fn list_pages_newest_first_with_filters() {
    let (engine, _) = engine_with_notifier().await;
    for day in 1..=5 {
        let payment = SessionPayment::new(
            format!("session-{day}"),
            if day % 2 == 0 { "learner-even" } else { "learner-odd" },
            "teacher-1",
            Money::new(10_00),
            at(day),
        )
        .currency(code("USD"));
        engine.create_transaction(payment).await.unwrap();
    }

    let filter = TransactionListFilter::default();
    let (page1, cursor) = engine.list_transactions(&filter, 2, None).await.unwrap();
    let sessions: Vec<&str> = page1.iter().map(|t| t.session_id.as_str()).collect();
    assert_eq!(sessions, vec!["session-5", "session-4"]);
    let cursor = cursor.unwrap();

    let (page2, cursor) = engine
        .list_transactions(&filter, 2, Some(&cursor))
        .await
        .unwrap();
    let sessions: Vec<&str> = page2.iter().map(|t| t.session_id.as_str()).collect();
    assert_eq!(sessions, vec!["session-3", "session-2"]);

    let (page3, cursor) = engine
        .list_transactions(&filter, 2, cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(page3.len(), 1);
    assert!(cursor.is_none());

    let even = TransactionListFilter {
        user_id: Some("learner-even".to_string()),
        ..Default::default()
    };
    let (txs, _) = engine.list_transactions(&even, 10, None).await.unwrap();
    assert_eq!(txs.len(), 2);

    let ranged = TransactionListFilter {
        from: Some(at(2)),
        to: Some(at(4)),
        statuses: Some(vec![TransactionStatus::PendingPayout]),
        ..Default::default()
    };
    let (txs, _) = engine.list_transactions(&ranged, 10, None).await.unwrap();
    assert_eq!(txs.len(), 2);

    let err = engine
        .list_transactions(&filter, 2, Some("bogus"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
}

#[tokio::test]
async fn earnings_summary_excludes_reverted_payments() {
    let (engine, _) = engine_with_notifier().await;
    let paid = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();
    engine
        .mark_paid(paid.id, MarkPaidCmd::new("admin", at(2)))
        .await
        .unwrap();
    engine
        .create_transaction(usd_payment("session-2", 100_00))
        .await
        .unwrap();
    let reverted = engine
        .create_transaction(usd_payment("session-3", 100_00))
        .await
        .unwrap();
    engine
        .revert(
            reverted.id,
            RevertCmd::new("admin", at(2)).deduction(Money::new(25_00)),
        )
        .await
        .unwrap();

    let summary = engine.earnings_summary(None, None).await.unwrap();
    assert_eq!(summary.transactions, 3);
    assert_eq!(summary.paid_out_count, 1);
    assert_eq!(summary.pending_count, 1);
    assert_eq!(summary.reverted_count, 1);
    assert_eq!(summary.gross_npr, Money::new(26_666_66));
    assert_eq!(summary.platform_fee_npr, Money::new(2_666_66));
    assert_eq!(summary.paid_out_npr, Money::new(12_000_00));
    assert_eq!(summary.pending_npr, Money::new(12_000_00));

    assert_eq!(summary.by_payer_currency.len(), 1);
    let usd = &summary.by_payer_currency[0];
    assert_eq!(usd.currency, code("USD"));
    assert_eq!(usd.transactions, 3);
    assert_eq!(usd.amount_paid, Money::new(200_00));
    assert_eq!(usd.refunded, Money::new(75_00));

    let empty = engine
        .earnings_summary(Some(at(20)), Some(at(21)))
        .await
        .unwrap();
    assert_eq!(empty.transactions, 0);
    assert!(engine.earnings_summary(Some(at(2)), Some(at(1))).await.is_err());
}

#[tokio::test]
async fn purge_removes_transaction_and_trail() {
    let (engine, _) = engine_with_notifier().await;
    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();
    engine
        .mark_paid(tx.id, MarkPaidCmd::new("admin", at(2)))
        .await
        .unwrap();

    engine.purge_transaction(tx.id).await.unwrap();

    assert_eq!(
        engine.transaction(tx.id).await.unwrap_err(),
        EngineError::KeyNotFound("transaction not found".to_string())
    );
    assert!(engine.transaction_by_session("session-1").await.is_err());
    assert!(engine.rate_history(tx.id).await.is_err());
}

#[tokio::test]
async fn concurrent_mark_paid_settles_once() {
    let (engine, path) = engine_with_file_db().await;
    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        engine.mark_paid(tx.id, MarkPaidCmd::new("admin-a", at(2))),
        engine.mark_paid(tx.id, MarkPaidCmd::new("admin-b", at(2))),
    );

    let results = [first, second];
    let settled: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].status, TransactionStatus::PaidToTeacher);
    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .unwrap();
    // The loser either sees the new status or is turned away by SQLite's write lock.
    assert!(
        err.is_conflict() || matches!(err, EngineError::Database(_)),
        "unexpected error: {err}"
    );
    assert_eq!(engine.rate_history(tx.id).await.unwrap().len(), 1);

    drop(engine);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn oversized_rates_degrade_instead_of_failing() {
    let (engine, _) = engine_with_notifier().await;
    let tx = engine
        .create_transaction(usd_payment("session-1", 100_00))
        .await
        .unwrap();

    let paid = engine
        .mark_paid(
            tx.id,
            MarkPaidCmd::new("admin", at(2)).rate(dec!(100000000000000000000000000)),
        )
        .await
        .unwrap();
    assert_eq!(paid.status, TransactionStatus::PaidToTeacher);
    assert_eq!(paid.exchange_rate, Some(dec!(1)));
    assert_eq!(paid.payout_amount, Some(Money::new(12_000_00)));

    let err = engine
        .record_rate_correction(
            tx.id,
            RateCorrectionCmd::new("admin", dec!(100000000000000000000000000), at(3)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRate(_)));
    assert_eq!(engine.rate_history(tx.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn zero_page_size_is_rejected() {
    let (engine, _) = engine_with_notifier().await;
    engine
        .create_transaction(usd_payment("session-1", 10_00))
        .await
        .unwrap();

    let err = engine
        .list_transactions(&TransactionListFilter::default(), 0, None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("limit must be > 0".to_string())
    );
}
