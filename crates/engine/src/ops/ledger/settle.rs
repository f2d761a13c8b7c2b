use rust_decimal::Decimal;
use sea_orm::{ActiveValue, ConnectionTrait, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ComplaintResolution, ComplaintStatus, CurrencyCode, EngineError, EventKind, MarkPaidCmd,
    Money, PayoutOverride, RateCorrectionCmd, RateHistoryEntry, ResultEngine, RevertCmd,
    SessionPayment, Settlement, SettlementEvent, Transaction, TransactionStatus, apply_rate,
    compute_payout, rate_history, transactions,
    util::{normalize_optional_text, normalize_required},
};

use super::super::{
    Engine, append_note, disputes::close_active_complaints, load_transaction,
    update_transaction_guarded, with_tx,
};
use super::find_by_session;

impl Engine {
    /// Records the payment for a booking session.
    ///
    /// Idempotent per `session_id`: a second call returns the existing
    /// transaction unchanged. Free sessions (flagged free or zero amount)
    /// are stored directly as `paid_to_teacher` with every amount at zero.
    pub async fn create_transaction(&self, payment: SessionPayment) -> ResultEngine<Transaction> {
        let session_id = normalize_required(&payment.session_id, "session id")?;
        normalize_required(&payment.learner_id, "learner id")?;
        normalize_required(&payment.teacher_id, "teacher id")?;
        if payment.amount.is_negative() {
            return Err(EngineError::InvalidAmount(
                "amount must be >= 0".to_string(),
            ));
        }

        let created = with_tx!(self, |db_tx| {
            self.create_transaction_in_tx(&db_tx, &session_id, &payment)
                .await
        });
        let (tx, is_new) = match created {
            Ok(created) => created,
            Err(EngineError::Database(err)) => {
                // A concurrent request may have won the unique session index.
                return match find_by_session(&self.database, &session_id).await? {
                    Some(existing) => Ok(existing),
                    None => Err(EngineError::Database(err)),
                };
            }
            Err(err) => return Err(err),
        };

        if is_new && tx.status == TransactionStatus::PendingPayout {
            self.emit(vec![SettlementEvent::transaction(
                EventKind::PaymentDone,
                &tx.teacher_id,
                tx.id,
            )])
            .await;
        }
        Ok(tx)
    }

    async fn create_transaction_in_tx<C: ConnectionTrait>(
        &self,
        db: &C,
        session_id: &str,
        payment: &SessionPayment,
    ) -> ResultEngine<(Transaction, bool)> {
        if let Some(existing) = find_by_session(db, session_id).await? {
            tracing::debug!(session_id, "transaction already recorded");
            return Ok((existing, false));
        }

        let config = self.load_config(db).await?;
        let pivot = CurrencyCode::pivot();
        let payer_currency = config.resolve_currency(
            payment.currency.as_ref(),
            payment.learner_country.as_deref(),
            &pivot,
        );
        let payout_currency = config.resolve_currency(
            payment.payout_currency.as_ref(),
            payment.teacher_country.as_deref(),
            &payer_currency,
        );
        let fee_percent = config.platform_fee_percent;
        let is_free = payment.is_free || payment.amount.is_zero();

        let settlement = if is_free {
            Settlement::from_amounts(Money::ZERO, Money::ZERO, &payer_currency, fee_percent)
        } else {
            Settlement::compute(
                payment.amount,
                &payer_currency,
                fee_percent,
                &config.currency_rates,
            )
        };

        let (status, paid_at, paid_to_teacher_at, payout_amount) = if is_free {
            (
                TransactionStatus::PaidToTeacher,
                None,
                Some(payment.occurred_at),
                Some(Money::ZERO),
            )
        } else {
            (
                TransactionStatus::PendingPayout,
                Some(payment.occurred_at),
                None,
                None,
            )
        };

        let tx = Transaction {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            learner_id: payment.learner_id.trim().to_string(),
            teacher_id: payment.teacher_id.trim().to_string(),
            amount_paid: settlement.amount_paid,
            payer_currency,
            platform_fee_percent: fee_percent,
            platform_fee_amount: settlement.payer_split.fee,
            teacher_amount: settlement.payer_split.net,
            payout_currency,
            amount_paid_npr: settlement.amount_paid_pivot,
            platform_fee_amount_npr: settlement.pivot_split.fee,
            teacher_amount_npr: settlement.pivot_split.net,
            exchange_rate: None,
            payout_amount,
            status,
            created_at: payment.occurred_at,
            paid_at,
            paid_to_teacher_at,
            reverted_at: None,
            revert_deduction_amount: None,
            revert_refund_amount: None,
            note: None,
            exchange_rate_history: Vec::new(),
        };
        transactions::ActiveModel::from(&tx).insert(db).await?;

        tracing::info!(
            transaction_id = %tx.id,
            session_id,
            status = %tx.status,
            amount = %tx.amount_paid,
            currency = %tx.payer_currency,
            amount_npr = %tx.amount_paid_npr,
            "transaction created"
        );
        Ok((tx, true))
    }

    /// Settles a transaction: computes the payout, appends a rate history
    /// entry and moves it to `paid_to_teacher`.
    ///
    /// Also accepted on `complaint_raised`; the active complaint is then
    /// closed in the teacher's favour.
    pub async fn mark_paid(
        &self,
        transaction_id: Uuid,
        cmd: MarkPaidCmd,
    ) -> ResultEngine<Transaction> {
        let admin_id = normalize_required(&cmd.admin_id, "admin id")?;
        if cmd.rate.is_some_and(|rate| rate < Decimal::ZERO) {
            return Err(EngineError::InvalidRate(
                "payout rate must be >= 0".to_string(),
            ));
        }
        if cmd.amount.is_some_and(Money::is_negative) {
            return Err(EngineError::InvalidAmount(
                "payout amount must be >= 0".to_string(),
            ));
        }
        let note = normalize_optional_text(cmd.note.as_deref());

        let (tx, events) = with_tx!(self, |db_tx| {
            let current = load_transaction(&db_tx, transaction_id).await?;
            if !current
                .status
                .can_transition_to(TransactionStatus::PaidToTeacher)
            {
                return Err(current.status.conflict());
            }
            let config = self.load_config(&db_tx).await?;

            let mut changes = <transactions::ActiveModel as Default>::default();
            let teacher_amount_npr = match cmd.fee_percent {
                Some(fee_percent) => {
                    let settlement = Settlement::from_amounts(
                        current.amount_paid,
                        current.amount_paid_npr,
                        &current.payer_currency,
                        fee_percent,
                    );
                    changes.platform_fee_percent =
                        ActiveValue::Set(fee_percent.value().to_string());
                    changes.platform_fee_minor =
                        ActiveValue::Set(settlement.payer_split.fee.minor());
                    changes.teacher_amount_minor =
                        ActiveValue::Set(settlement.payer_split.net.minor());
                    changes.platform_fee_npr_minor =
                        ActiveValue::Set(settlement.pivot_split.fee.minor());
                    changes.teacher_amount_npr_minor =
                        ActiveValue::Set(settlement.pivot_split.net.minor());
                    settlement.pivot_split.net
                }
                None => current.teacher_amount_npr,
            };

            let payout = compute_payout(
                teacher_amount_npr,
                &current.payout_currency,
                &config.currency_rates,
                PayoutOverride {
                    rate: cmd.rate,
                    amount: cmd.amount,
                },
            );

            changes.status = ActiveValue::Set(TransactionStatus::PaidToTeacher.as_str().to_string());
            changes.exchange_rate = ActiveValue::Set(Some(payout.rate.to_string()));
            changes.payout_amount_minor = ActiveValue::Set(Some(payout.amount.minor()));
            changes.paid_to_teacher_at = ActiveValue::Set(Some(cmd.at));
            changes.note = ActiveValue::Set(append_note(current.note.clone(), note.clone()));
            update_transaction_guarded(&db_tx, transaction_id, current.status, changes).await?;

            let entry = RateHistoryEntry::new(
                transaction_id,
                next_history_seq(&current.exchange_rate_history)?,
                cmd.at,
                payout.rate,
                payout.amount,
                note,
                admin_id.clone(),
            );
            rate_history::ActiveModel::from(&entry).insert(&db_tx).await?;

            let mut events = vec![SettlementEvent::transaction(
                EventKind::PayoutReceived,
                &current.teacher_id,
                transaction_id,
            )];
            if current.status == TransactionStatus::ComplaintRaised {
                let closed = close_active_complaints(
                    &db_tx,
                    transaction_id,
                    ComplaintStatus::Resolved,
                    ComplaintResolution::ReassignedMeetingPaid,
                    None,
                    cmd.at,
                    &admin_id,
                )
                .await?;
                events.extend(closed.iter().map(|c| {
                    SettlementEvent::complaint(EventKind::ComplaintResolved, &c.raised_by, c.id)
                }));
            }

            tracing::info!(
                %transaction_id,
                rate = %payout.rate,
                amount = %payout.amount,
                currency = %current.payout_currency,
                source = ?payout.source,
                "transaction paid to teacher"
            );
            let tx = load_transaction(&db_tx, transaction_id).await?;
            Ok((tx, events))
        })?;

        self.emit(events).await;
        Ok(tx)
    }

    /// Refunds a transaction to the learner, keeping `cmd.deduction`.
    pub async fn revert(&self, transaction_id: Uuid, cmd: RevertCmd) -> ResultEngine<Transaction> {
        let admin_id = normalize_required(&cmd.admin_id, "admin id")?;
        let (tx, events) = with_tx!(self, |db_tx| {
            revert_in_tx(&db_tx, transaction_id, &cmd, &admin_id).await
        })?;
        self.emit(events).await;
        Ok(tx)
    }

    /// Appends a corrected rate to the history of a settled transaction.
    ///
    /// The transaction record itself is not modified.
    pub async fn record_rate_correction(
        &self,
        transaction_id: Uuid,
        cmd: RateCorrectionCmd,
    ) -> ResultEngine<RateHistoryEntry> {
        let admin_id = normalize_required(&cmd.admin_id, "admin id")?;
        if cmd.rate <= Decimal::ZERO {
            return Err(EngineError::InvalidRate(
                "corrected rate must be > 0".to_string(),
            ));
        }
        if cmd.payout_amount.is_some_and(Money::is_negative) {
            return Err(EngineError::InvalidAmount(
                "payout amount must be >= 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let current = load_transaction(&db_tx, transaction_id).await?;
            if current.status != TransactionStatus::PaidToTeacher {
                return Err(EngineError::Conflict(format!(
                    "transaction is not settled (status: {})",
                    current.status
                )));
            }
            let payout_amount = match cmd.payout_amount {
                Some(amount) => amount,
                None => apply_rate(current.teacher_amount_npr, cmd.rate).ok_or_else(|| {
                    EngineError::InvalidRate(format!("corrected rate {} is too large", cmd.rate))
                })?,
            };
            let entry = RateHistoryEntry::new(
                transaction_id,
                next_history_seq(&current.exchange_rate_history)?,
                cmd.at,
                cmd.rate,
                payout_amount,
                normalize_optional_text(cmd.note.as_deref()),
                admin_id,
            );
            rate_history::ActiveModel::from(&entry).insert(&db_tx).await?;
            tracing::info!(%transaction_id, rate = %entry.rate, "rate correction recorded");
            Ok(entry)
        })
    }
}

/// Sequence number of the next rate history entry.
fn next_history_seq(history: &[RateHistoryEntry]) -> ResultEngine<i32> {
    i32::try_from(history.len())
        .ok()
        .and_then(|len| len.checked_add(1))
        .ok_or_else(|| EngineError::Conflict("rate history is full".to_string()))
}

/// Moves a transaction to `reverted_to_learner` and closes its active
/// complaints with the same deduction.
pub(in crate::ops) async fn revert_in_tx<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
    cmd: &RevertCmd,
    admin_id: &str,
) -> ResultEngine<(Transaction, Vec<SettlementEvent>)> {
    let current = load_transaction(db, transaction_id).await?;
    if !current
        .status
        .can_transition_to(TransactionStatus::RevertedToLearner)
    {
        return Err(current.status.conflict());
    }

    let deduction = cmd.deduction.clamp_to(Money::ZERO, current.amount_paid);
    let refund = current.amount_paid - deduction;
    let note = append_note(
        current.note.clone(),
        normalize_optional_text(cmd.note.as_deref()),
    );

    let changes = transactions::ActiveModel {
        status: ActiveValue::Set(TransactionStatus::RevertedToLearner.as_str().to_string()),
        reverted_at: ActiveValue::Set(Some(cmd.at)),
        revert_deduction_minor: ActiveValue::Set(Some(deduction.minor())),
        revert_refund_minor: ActiveValue::Set(Some(refund.minor())),
        note: ActiveValue::Set(note),
        ..Default::default()
    };
    update_transaction_guarded(db, transaction_id, current.status, changes).await?;

    let closed = close_active_complaints(
        db,
        transaction_id,
        ComplaintStatus::Reverted,
        ComplaintResolution::RevertedToLearner,
        Some(deduction),
        cmd.at,
        admin_id,
    )
    .await?;

    let mut events = vec![SettlementEvent::transaction(
        EventKind::PaymentReverted,
        &current.learner_id,
        transaction_id,
    )];
    events.extend(
        closed
            .iter()
            .map(|c| SettlementEvent::complaint(EventKind::ComplaintResolved, &c.raised_by, c.id)),
    );

    tracing::info!(
        %transaction_id,
        deduction = %deduction,
        refund = %refund,
        complaints = closed.len(),
        "transaction reverted to learner"
    );
    let tx = load_transaction(db, transaction_id).await?;
    Ok((tx, events))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn history_seq_follows_the_last_entry() {
        assert_eq!(next_history_seq(&[]).unwrap(), 1);
        let entry = RateHistoryEntry::new(
            Uuid::new_v4(),
            1,
            Utc::now(),
            dec!(0.0075),
            Money::new(90_00),
            None,
            "admin".to_string(),
        );
        assert_eq!(next_history_seq(&[entry.clone(), entry]).unwrap(), 3);
    }
}
