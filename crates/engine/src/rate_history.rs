//! Append-only exchange-rate audit trail.
//!
//! Every payout (and every later admin correction) appends one entry. Entries
//! are never updated or deleted outside of an explicit transaction purge.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    util::{parse_decimal, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateHistoryEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    /// Position in the trail, starting at 1.
    pub seq: i32,
    pub at: DateTime<Utc>,
    pub rate: Decimal,
    pub payout_amount: Money,
    pub note: Option<String>,
    pub admin_id: String,
}

impl RateHistoryEntry {
    pub(crate) fn new(
        transaction_id: Uuid,
        seq: i32,
        at: DateTime<Utc>,
        rate: Decimal,
        payout_amount: Money,
        note: Option<String>,
        admin_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            seq,
            at,
            rate,
            payout_amount,
            note,
            admin_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rate_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub seq: i32,
    pub at: DateTimeUtc,
    pub rate: String,
    pub payout_amount_minor: i64,
    pub note: Option<String>,
    pub admin_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RateHistoryEntry> for ActiveModel {
    fn from(entry: &RateHistoryEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            transaction_id: ActiveValue::Set(entry.transaction_id.to_string()),
            seq: ActiveValue::Set(entry.seq),
            at: ActiveValue::Set(entry.at),
            rate: ActiveValue::Set(entry.rate.to_string()),
            payout_amount_minor: ActiveValue::Set(entry.payout_amount.minor()),
            note: ActiveValue::Set(entry.note.clone()),
            admin_id: ActiveValue::Set(entry.admin_id.clone()),
        }
    }
}

impl TryFrom<Model> for RateHistoryEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "rate history")?,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            seq: model.seq,
            at: model.at,
            rate: parse_decimal(&model.rate, "exchange rate")?,
            payout_amount: Money::new(model.payout_amount_minor),
            note: model.note,
            admin_id: model.admin_id,
        })
    }
}
