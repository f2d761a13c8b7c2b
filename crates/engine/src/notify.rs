//! Seams to the collaborators the engine talks to.
//!
//! - [`Notifier`] receives settlement events after the change is committed.
//!   Delivery is fire-and-forget: a failing notifier is logged and never
//!   undoes or fails the operation.
//! - [`SessionLinks`] updates a session's meeting link when a complaint is
//!   resolved by reassigning the meeting. It runs inside the database
//!   transaction, so its failure rolls the resolution back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type returned by collaborator implementations.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PaymentDone,
    PayoutReceived,
    PaymentReverted,
    ComplaintRaised,
    ComplaintResolved,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PaymentDone => "payment_done",
            Self::PayoutReceived => "payout_received",
            Self::PaymentReverted => "payment_reverted",
            Self::ComplaintRaised => "complaint_raised",
            Self::ComplaintResolved => "complaint_resolved",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedModel {
    Transaction,
    Complaint,
}

/// One notification addressed to one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub kind: EventKind,
    pub user_id: String,
    pub related_id: Uuid,
    pub related_model: RelatedModel,
}

impl SettlementEvent {
    pub(crate) fn transaction(kind: EventKind, user_id: &str, transaction_id: Uuid) -> Self {
        Self {
            kind,
            user_id: user_id.to_string(),
            related_id: transaction_id,
            related_model: RelatedModel::Transaction,
        }
    }

    pub(crate) fn complaint(kind: EventKind, user_id: &str, complaint_id: Uuid) -> Self {
        Self {
            kind,
            user_id: user_id.to_string(),
            related_id: complaint_id,
            related_model: RelatedModel::Complaint,
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &SettlementEvent) -> Result<(), CollaboratorError>;
}

/// Default notifier: writes events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &SettlementEvent) -> Result<(), CollaboratorError> {
        tracing::info!(
            kind = event.kind.as_str(),
            user_id = %event.user_id,
            related_id = %event.related_id,
            "settlement event"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
pub trait SessionLinks: Send + Sync {
    async fn reassign_meeting_link(
        &self,
        session_id: &str,
        meeting_link: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Accepts every reassignment without doing anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionLinks;

#[async_trait::async_trait]
impl SessionLinks for NoopSessionLinks {
    async fn reassign_meeting_link(
        &self,
        session_id: &str,
        _meeting_link: &str,
    ) -> Result<(), CollaboratorError> {
        tracing::debug!(session_id, "meeting link reassignment ignored");
        Ok(())
    }
}
