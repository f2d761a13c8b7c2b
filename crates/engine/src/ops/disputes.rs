use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    AdminProofCmd, ComplaintResolution, ComplaintRole, ComplaintStatus, EngineError, EventKind,
    Money, PaymentComplaint, RaiseComplaintCmd, ResolveReassignCmd, ResultEngine, RevertCmd,
    SettlementEvent, TransactionStatus, complaints, transactions,
    util::{encode_string_list, normalize_optional_text, normalize_required, normalize_urls},
};

use super::{
    Engine, append_note, ledger::revert_in_tx, load_transaction, update_complaint_guarded,
    update_transaction_guarded, with_tx,
};

impl Engine {
    /// Opens a complaint on a transaction that is not settled yet.
    ///
    /// Only the learner or the teacher of the transaction may complain, and
    /// only one complaint may await a decision at a time.
    pub async fn raise_complaint(&self, cmd: RaiseComplaintCmd) -> ResultEngine<PaymentComplaint> {
        let raised_by = normalize_required(&cmd.raised_by, "user id")?;
        let reason = normalize_required(&cmd.reason, "complaint reason")?;

        let (complaint, events) = with_tx!(self, |db_tx| {
            let tx = load_transaction(&db_tx, cmd.transaction_id).await?;
            if !tx.involves(&raised_by) {
                return Err(EngineError::Forbidden(
                    "only the learner or the teacher can raise a complaint".to_string(),
                ));
            }
            if tx.status.is_terminal() {
                return Err(tx.status.conflict());
            }
            if let Some(active) = active_complaints(&db_tx, tx.id).await?.first() {
                return Err(EngineError::Conflict(format!(
                    "complaint already open (status: {})",
                    active.status
                )));
            }

            let (role, counterparty) = if tx.learner_id == raised_by {
                (ComplaintRole::Learner, tx.teacher_id.clone())
            } else {
                (ComplaintRole::Teacher, tx.learner_id.clone())
            };
            let complaint = PaymentComplaint {
                id: Uuid::new_v4(),
                transaction_id: tx.id,
                raised_by,
                role,
                reason,
                proof_urls: normalize_urls(&cmd.proof_urls),
                status: ComplaintStatus::Open,
                admin_notes: None,
                proof_submitted_by_admin: Vec::new(),
                resolution: None,
                revert_deduction_amount: None,
                created_at: cmd.at,
                resolved_at: None,
                resolved_by: None,
            };

            if tx.status == TransactionStatus::PendingPayout {
                let changes = transactions::ActiveModel {
                    status: ActiveValue::Set(
                        TransactionStatus::ComplaintRaised.as_str().to_string(),
                    ),
                    ..Default::default()
                };
                update_transaction_guarded(&db_tx, tx.id, tx.status, changes).await?;
            }
            complaints::ActiveModel::from(&complaint)
                .insert(&db_tx)
                .await?;

            tracing::info!(
                complaint_id = %complaint.id,
                transaction_id = %tx.id,
                role = complaint.role.as_str(),
                "complaint raised"
            );
            let events = vec![SettlementEvent::complaint(
                EventKind::ComplaintRaised,
                &counterparty,
                complaint.id,
            )];
            Ok((complaint, events))
        })?;

        self.emit(events).await;
        Ok(complaint)
    }

    /// Attaches admin proof and notes; moves the complaint to
    /// `proof_required`.
    pub async fn submit_admin_proof(
        &self,
        complaint_id: Uuid,
        cmd: AdminProofCmd,
    ) -> ResultEngine<PaymentComplaint> {
        let admin_id = normalize_required(&cmd.admin_id, "admin id")?;
        with_tx!(self, |db_tx| {
            let complaint = require_complaint(&db_tx, complaint_id).await?;
            if !complaint.status.is_active() {
                return Err(closed_conflict(complaint.status));
            }

            let mut proofs = complaint.proof_submitted_by_admin.clone();
            proofs.extend(cmd.proof_urls.iter().cloned());
            let changes = complaints::ActiveModel {
                status: ActiveValue::Set(ComplaintStatus::ProofRequired.as_str().to_string()),
                proof_submitted_by_admin: ActiveValue::Set(encode_string_list(&normalize_urls(
                    &proofs,
                ))),
                admin_notes: ActiveValue::Set(append_note(
                    complaint.admin_notes.clone(),
                    normalize_optional_text(cmd.notes.as_deref()),
                )),
                ..Default::default()
            };
            update_complaint_guarded(&db_tx, complaint_id, changes).await?;
            tracing::info!(%complaint_id, admin_id = %admin_id, "admin proof submitted");
            require_complaint(&db_tx, complaint_id).await
        })
    }

    /// Resolves a complaint in the teacher's favour: the meeting link is
    /// optionally reassigned and the transaction is marked paid without
    /// recomputing the payout.
    pub async fn resolve_reassign(
        &self,
        complaint_id: Uuid,
        cmd: ResolveReassignCmd,
    ) -> ResultEngine<PaymentComplaint> {
        let admin_id = normalize_required(&cmd.admin_id, "admin id")?;
        let link = normalize_optional_text(cmd.new_meeting_link.as_deref());

        let (complaint, events) = with_tx!(self, |db_tx| {
            let complaint = require_complaint(&db_tx, complaint_id).await?;
            if !complaint.status.is_active() {
                return Err(closed_conflict(complaint.status));
            }
            let tx = load_transaction(&db_tx, complaint.transaction_id).await?;
            if !tx.status.can_transition_to(TransactionStatus::PaidToTeacher) {
                return Err(tx.status.conflict());
            }

            let tx_changes = transactions::ActiveModel {
                status: ActiveValue::Set(TransactionStatus::PaidToTeacher.as_str().to_string()),
                paid_to_teacher_at: ActiveValue::Set(Some(cmd.at)),
                ..Default::default()
            };
            update_transaction_guarded(&db_tx, tx.id, tx.status, tx_changes).await?;

            let changes = complaints::ActiveModel {
                status: ActiveValue::Set(ComplaintStatus::Resolved.as_str().to_string()),
                resolution: ActiveValue::Set(Some(
                    ComplaintResolution::ReassignedMeetingPaid.as_str().to_string(),
                )),
                admin_notes: ActiveValue::Set(append_note(
                    complaint.admin_notes.clone(),
                    normalize_optional_text(cmd.notes.as_deref()),
                )),
                resolved_at: ActiveValue::Set(Some(cmd.at)),
                resolved_by: ActiveValue::Set(Some(admin_id.clone())),
                ..Default::default()
            };
            update_complaint_guarded(&db_tx, complaint_id, changes).await?;

            if let Some(link) = &link {
                self.session_links
                    .reassign_meeting_link(&tx.session_id, link)
                    .await
                    .map_err(|err| EngineError::Collaborator(err.to_string()))?;
            }

            tracing::info!(
                %complaint_id,
                transaction_id = %tx.id,
                reassigned = link.is_some(),
                "complaint resolved, meeting paid"
            );
            let events = vec![
                SettlementEvent::transaction(EventKind::PayoutReceived, &tx.teacher_id, tx.id),
                SettlementEvent::complaint(
                    EventKind::ComplaintResolved,
                    &complaint.raised_by,
                    complaint_id,
                ),
            ];
            let complaint = require_complaint(&db_tx, complaint_id).await?;
            Ok((complaint, events))
        })?;

        self.emit(events).await;
        Ok(complaint)
    }

    /// Resolves a complaint in the learner's favour by reverting the
    /// transaction.
    pub async fn resolve_revert(
        &self,
        complaint_id: Uuid,
        cmd: RevertCmd,
    ) -> ResultEngine<PaymentComplaint> {
        let admin_id = normalize_required(&cmd.admin_id, "admin id")?;
        let (complaint, events) = with_tx!(self, |db_tx| {
            let complaint = require_complaint(&db_tx, complaint_id).await?;
            if !complaint.status.is_active() {
                return Err(closed_conflict(complaint.status));
            }
            let (_, events) =
                revert_in_tx(&db_tx, complaint.transaction_id, &cmd, &admin_id).await?;
            let complaint = require_complaint(&db_tx, complaint_id).await?;
            Ok((complaint, events))
        })?;

        self.emit(events).await;
        Ok(complaint)
    }

    pub async fn complaint(&self, complaint_id: Uuid) -> ResultEngine<PaymentComplaint> {
        require_complaint(&self.database, complaint_id).await
    }

    /// Complaints of one transaction, oldest first.
    pub async fn complaints_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> ResultEngine<Vec<PaymentComplaint>> {
        complaints::Entity::find()
            .filter(complaints::Column::TransactionId.eq(transaction_id.to_string()))
            .order_by_asc(complaints::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(PaymentComplaint::try_from)
            .collect()
    }

    /// Complaints across all transactions, newest first.
    pub async fn list_complaints(
        &self,
        status: Option<ComplaintStatus>,
    ) -> ResultEngine<Vec<PaymentComplaint>> {
        let mut query = complaints::Entity::find()
            .order_by_desc(complaints::Column::CreatedAt)
            .order_by_desc(complaints::Column::Id);
        if let Some(status) = status {
            query = query.filter(complaints::Column::Status.eq(status.as_str()));
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(PaymentComplaint::try_from)
            .collect()
    }
}

async fn require_complaint<C: ConnectionTrait>(
    db: &C,
    complaint_id: Uuid,
) -> ResultEngine<PaymentComplaint> {
    let model = complaints::Entity::find_by_id(complaint_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("complaint not found".to_string()))?;
    PaymentComplaint::try_from(model)
}

async fn active_complaints<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<Vec<PaymentComplaint>> {
    complaints::Entity::find()
        .filter(complaints::Column::TransactionId.eq(transaction_id.to_string()))
        .filter(complaints::Column::Status.is_in(ComplaintStatus::active()))
        .order_by_asc(complaints::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(PaymentComplaint::try_from)
        .collect()
}

fn closed_conflict(status: ComplaintStatus) -> EngineError {
    EngineError::Conflict(format!("complaint already closed (status: {status})"))
}

/// Closes every complaint of a transaction that still awaits a decision and
/// returns the closed complaints.
pub(super) async fn close_active_complaints<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
    status: ComplaintStatus,
    resolution: ComplaintResolution,
    deduction: Option<Money>,
    at: DateTime<Utc>,
    admin_id: &str,
) -> ResultEngine<Vec<PaymentComplaint>> {
    let active = active_complaints(db, transaction_id).await?;
    for complaint in &active {
        let changes = complaints::ActiveModel {
            status: ActiveValue::Set(status.as_str().to_string()),
            resolution: ActiveValue::Set(Some(resolution.as_str().to_string())),
            revert_deduction_minor: ActiveValue::Set(deduction.map(Money::minor)),
            resolved_at: ActiveValue::Set(Some(at)),
            resolved_by: ActiveValue::Set(Some(admin_id.to_string())),
            ..Default::default()
        };
        update_complaint_guarded(db, complaint.id, changes).await?;
    }
    Ok(active)
}
