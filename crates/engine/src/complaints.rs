//! Payment complaints (disputes) attached to a transaction.
//!
//! ```text
//! open ──► proof_required ──► resolved | reverted
//!   └──────────────────────► resolved | reverted
//! ```
//!
//! Terminal complaint states mirror the two dispute exits of the ledger:
//! `resolved` goes with `paid_to_teacher`, `reverted` with
//! `reverted_to_learner`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    util::{encode_string_list, parse_string_list, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Open,
    ProofRequired,
    Resolved,
    Reverted,
}

impl ComplaintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ProofRequired => "proof_required",
            Self::Resolved => "resolved",
            Self::Reverted => "reverted",
        }
    }

    /// `open` and `proof_required` still await an admin decision.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::ProofRequired)
    }

    pub(crate) fn active() -> [&'static str; 2] {
        [Self::Open.as_str(), Self::ProofRequired.as_str()]
    }
}

impl core::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ComplaintStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "proof_required" => Ok(Self::ProofRequired),
            "resolved" => Ok(Self::Resolved),
            "reverted" => Ok(Self::Reverted),
            other => Err(EngineError::InvalidId(format!(
                "invalid complaint status: {other}"
            ))),
        }
    }
}

/// Which side of the transaction raised the complaint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintRole {
    Learner,
    Teacher,
}

impl ComplaintRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Teacher => "teacher",
        }
    }
}

impl TryFrom<&str> for ComplaintRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "learner" => Ok(Self::Learner),
            "teacher" => Ok(Self::Teacher),
            other => Err(EngineError::InvalidId(format!(
                "invalid complaint role: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintResolution {
    ReassignedMeetingPaid,
    RevertedToLearner,
}

impl ComplaintResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReassignedMeetingPaid => "reassigned_meeting_paid",
            Self::RevertedToLearner => "reverted_to_learner",
        }
    }
}

impl TryFrom<&str> for ComplaintResolution {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "reassigned_meeting_paid" => Ok(Self::ReassignedMeetingPaid),
            "reverted_to_learner" => Ok(Self::RevertedToLearner),
            other => Err(EngineError::InvalidId(format!(
                "invalid complaint resolution: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentComplaint {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub raised_by: String,
    pub role: ComplaintRole,
    pub reason: String,
    pub proof_urls: Vec<String>,
    pub status: ComplaintStatus,
    pub admin_notes: Option<String>,
    pub proof_submitted_by_admin: Vec<String>,
    pub resolution: Option<ComplaintResolution>,
    pub revert_deduction_amount: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_complaints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub raised_by: String,
    pub role: String,
    pub reason: String,
    pub proof_urls: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub proof_submitted_by_admin: String,
    pub resolution: Option<String>,
    pub revert_deduction_minor: Option<i64>,
    pub created_at: DateTimeUtc,
    pub resolved_at: Option<DateTimeUtc>,
    pub resolved_by: Option<String>,
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

impl From<&PaymentComplaint> for ActiveModel {
    fn from(c: &PaymentComplaint) -> Self {
        Self {
            id: ActiveValue::Set(c.id.to_string()),
            transaction_id: ActiveValue::Set(c.transaction_id.to_string()),
            raised_by: ActiveValue::Set(c.raised_by.clone()),
            role: ActiveValue::Set(c.role.as_str().to_string()),
            reason: ActiveValue::Set(c.reason.clone()),
            proof_urls: ActiveValue::Set(encode_string_list(&c.proof_urls)),
            status: ActiveValue::Set(c.status.as_str().to_string()),
            admin_notes: ActiveValue::Set(c.admin_notes.clone()),
            proof_submitted_by_admin: ActiveValue::Set(encode_string_list(
                &c.proof_submitted_by_admin,
            )),
            resolution: ActiveValue::Set(c.resolution.map(|r| r.as_str().to_string())),
            revert_deduction_minor: ActiveValue::Set(c.revert_deduction_amount.map(Money::minor)),
            created_at: ActiveValue::Set(c.created_at),
            resolved_at: ActiveValue::Set(c.resolved_at),
            resolved_by: ActiveValue::Set(c.resolved_by.clone()),
        }
    }
}

impl TryFrom<Model> for PaymentComplaint {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "complaint")?,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            raised_by: model.raised_by,
            role: ComplaintRole::try_from(model.role.as_str())?,
            reason: model.reason,
            proof_urls: parse_string_list(&model.proof_urls, "proof url")?,
            status: ComplaintStatus::try_from(model.status.as_str())?,
            admin_notes: model.admin_notes,
            proof_submitted_by_admin: parse_string_list(
                &model.proof_submitted_by_admin,
                "admin proof",
            )?,
            resolution: model
                .resolution
                .as_deref()
                .map(ComplaintResolution::try_from)
                .transpose()?,
            revert_deduction_amount: model.revert_deduction_minor.map(Money::new),
            created_at: model.created_at,
            resolved_at: model.resolved_at,
            resolved_by: model.resolved_by,
        })
    }
}
