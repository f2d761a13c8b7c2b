//! Settlement transactions.
//!
//! A `Transaction` records one session payment: what the learner paid, the
//! platform cut, the teacher's net, the same three amounts in the pivot
//! currency, and how the teacher was finally paid. Its status moves through
//! a small state machine:
//!
//! ```text
//! pending_payout ──► paid_to_teacher
//!      │   └───────► reverted_to_learner
//!      ▼
//! complaint_raised ──► paid_to_teacher | reverted_to_learner
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CurrencyCode, EngineError, FeePercent, Money, ResultEngine, rate_history::RateHistoryEntry,
    util::{parse_decimal, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingPayout,
    PaidToTeacher,
    ComplaintRaised,
    RevertedToLearner,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayout => "pending_payout",
            Self::PaidToTeacher => "paid_to_teacher",
            Self::ComplaintRaised => "complaint_raised",
            Self::RevertedToLearner => "reverted_to_learner",
        }
    }

    /// `paid_to_teacher` and `reverted_to_learner` are final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::PaidToTeacher | Self::RevertedToLearner)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::PendingPayout,
                Self::PaidToTeacher | Self::ComplaintRaised | Self::RevertedToLearner
            ) | (
                Self::ComplaintRaised,
                Self::PaidToTeacher | Self::RevertedToLearner
            )
        )
    }

    /// Conflict error describing why `self` cannot move on.
    pub(crate) fn conflict(self) -> EngineError {
        let message = match self {
            Self::PaidToTeacher => "already paid to teacher",
            Self::RevertedToLearner => "already reverted to learner",
            Self::ComplaintRaised => "complaint already raised",
            Self::PendingPayout => "transaction is pending payout",
        };
        EngineError::Conflict(format!("{message} (status: {})", self.as_str()))
    }
}

impl core::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending_payout" => Ok(Self::PendingPayout),
            "paid_to_teacher" => Ok(Self::PaidToTeacher),
            "complaint_raised" => Ok(Self::ComplaintRaised),
            "reverted_to_learner" => Ok(Self::RevertedToLearner),
            other => Err(EngineError::InvalidId(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub session_id: String,
    pub learner_id: String,
    pub teacher_id: String,

    pub amount_paid: Money,
    pub payer_currency: CurrencyCode,
    pub platform_fee_percent: FeePercent,
    pub platform_fee_amount: Money,
    pub teacher_amount: Money,
    pub payout_currency: CurrencyCode,

    pub amount_paid_npr: Money,
    pub platform_fee_amount_npr: Money,
    pub teacher_amount_npr: Money,

    /// NPR → payout currency rate applied at settlement.
    pub exchange_rate: Option<Decimal>,
    pub payout_amount: Option<Money>,

    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_to_teacher_at: Option<DateTime<Utc>>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub revert_deduction_amount: Option<Money>,
    pub revert_refund_amount: Option<Money>,
    pub note: Option<String>,

    pub exchange_rate_history: Vec<RateHistoryEntry>,
}

impl Transaction {
    /// Returns `true` when the party is the learner or teacher of this payment.
    #[must_use]
    pub fn involves(&self, user_id: &str) -> bool {
        self.learner_id == user_id || self.teacher_id == user_id
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub session_id: String,
    pub learner_id: String,
    pub teacher_id: String,
    pub amount_paid_minor: i64,
    pub payer_currency: String,
    pub platform_fee_percent: String,
    pub platform_fee_minor: i64,
    pub teacher_amount_minor: i64,
    pub payout_currency: String,
    pub amount_paid_npr_minor: i64,
    pub platform_fee_npr_minor: i64,
    pub teacher_amount_npr_minor: i64,
    pub exchange_rate: Option<String>,
    pub payout_amount_minor: Option<i64>,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub paid_at: Option<DateTimeUtc>,
    pub paid_to_teacher_at: Option<DateTimeUtc>,
    pub reverted_at: Option<DateTimeUtc>,
    pub revert_deduction_minor: Option<i64>,
    pub revert_refund_minor: Option<i64>,
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rate_history::Entity")]
    RateHistory,
    #[sea_orm(has_many = "super::complaints::Entity")]
    Complaints,
}

impl Related<super::rate_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RateHistory.def()
    }
}

impl Related<super::complaints::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Complaints.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            session_id: ActiveValue::Set(tx.session_id.clone()),
            learner_id: ActiveValue::Set(tx.learner_id.clone()),
            teacher_id: ActiveValue::Set(tx.teacher_id.clone()),
            amount_paid_minor: ActiveValue::Set(tx.amount_paid.minor()),
            payer_currency: ActiveValue::Set(tx.payer_currency.to_string()),
            platform_fee_percent: ActiveValue::Set(tx.platform_fee_percent.value().to_string()),
            platform_fee_minor: ActiveValue::Set(tx.platform_fee_amount.minor()),
            teacher_amount_minor: ActiveValue::Set(tx.teacher_amount.minor()),
            payout_currency: ActiveValue::Set(tx.payout_currency.to_string()),
            amount_paid_npr_minor: ActiveValue::Set(tx.amount_paid_npr.minor()),
            platform_fee_npr_minor: ActiveValue::Set(tx.platform_fee_amount_npr.minor()),
            teacher_amount_npr_minor: ActiveValue::Set(tx.teacher_amount_npr.minor()),
            exchange_rate: ActiveValue::Set(tx.exchange_rate.map(|r| r.to_string())),
            payout_amount_minor: ActiveValue::Set(tx.payout_amount.map(Money::minor)),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            created_at: ActiveValue::Set(tx.created_at),
            paid_at: ActiveValue::Set(tx.paid_at),
            paid_to_teacher_at: ActiveValue::Set(tx.paid_to_teacher_at),
            reverted_at: ActiveValue::Set(tx.reverted_at),
            revert_deduction_minor: ActiveValue::Set(tx.revert_deduction_amount.map(Money::minor)),
            revert_refund_minor: ActiveValue::Set(tx.revert_refund_amount.map(Money::minor)),
            note: ActiveValue::Set(tx.note.clone()),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let fee_percent = parse_decimal(&model.platform_fee_percent, "fee percent")?;
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            session_id: model.session_id,
            learner_id: model.learner_id,
            teacher_id: model.teacher_id,
            amount_paid: Money::new(model.amount_paid_minor),
            payer_currency: CurrencyCode::parse(&model.payer_currency)?,
            platform_fee_percent: FeePercent::new(fee_percent)?,
            platform_fee_amount: Money::new(model.platform_fee_minor),
            teacher_amount: Money::new(model.teacher_amount_minor),
            payout_currency: CurrencyCode::parse(&model.payout_currency)?,
            amount_paid_npr: Money::new(model.amount_paid_npr_minor),
            platform_fee_amount_npr: Money::new(model.platform_fee_npr_minor),
            teacher_amount_npr: Money::new(model.teacher_amount_npr_minor),
            exchange_rate: model
                .exchange_rate
                .as_deref()
                .map(|raw| parse_decimal(raw, "exchange rate"))
                .transpose()?,
            payout_amount: model.payout_amount_minor.map(Money::new),
            status: TransactionStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            paid_at: model.paid_at,
            paid_to_teacher_at: model.paid_to_teacher_at,
            reverted_at: model.reverted_at,
            revert_deduction_amount: model.revert_deduction_minor.map(Money::new),
            revert_refund_amount: model.revert_refund_minor.map(Money::new),
            note: model.note,
            exchange_rate_history: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_accept_no_transition() {
        use TransactionStatus::*;
        for terminal in [PaidToTeacher, RevertedToLearner] {
            assert!(terminal.is_terminal());
            for next in [PendingPayout, PaidToTeacher, ComplaintRaised, RevertedToLearner] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn complaint_exits_match_ledger_exits() {
        use TransactionStatus::*;
        assert!(ComplaintRaised.can_transition_to(PaidToTeacher));
        assert!(ComplaintRaised.can_transition_to(RevertedToLearner));
        assert!(!ComplaintRaised.can_transition_to(PendingPayout));
        assert!(PendingPayout.can_transition_to(ComplaintRaised));
    }

    #[test]
    fn status_round_trips_through_storage() {
        use TransactionStatus::*;
        for status in [PendingPayout, PaidToTeacher, ComplaintRaised, RevertedToLearner] {
            assert_eq!(TransactionStatus::try_from(status.as_str()).unwrap(), status);
        }
        assert!(TransactionStatus::try_from("settled").is_err());
    }

    #[test]
    fn conflict_surfaces_current_status() {
        assert_eq!(
            TransactionStatus::PaidToTeacher.conflict(),
            EngineError::Conflict(
                "already paid to teacher (status: paid_to_teacher)".to_string()
            )
        );
    }
}
