use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    CurrencyCode, EngineError, Money, ResultEngine, Transaction, TransactionStatus, transactions,
};

use super::Engine;

/// Totals for one payer currency, in that currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    pub currency: CurrencyCode,
    pub transactions: u64,
    pub amount_paid: Money,
    pub platform_fee: Money,
    pub teacher_amount: Money,
    pub refunded: Money,
}

impl CurrencyTotals {
    fn new(currency: CurrencyCode) -> Self {
        Self {
            currency,
            transactions: 0,
            amount_paid: Money::ZERO,
            platform_fee: Money::ZERO,
            teacher_amount: Money::ZERO,
            refunded: Money::ZERO,
        }
    }
}

/// Platform earnings over `[from, to)`.
///
/// Pivot totals exclude reverted transactions; reverted payments are counted
/// separately and their refunds appear per payer currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub transactions: u64,
    pub gross_npr: Money,
    pub platform_fee_npr: Money,
    pub teacher_amount_npr: Money,
    /// Teacher net of settled transactions.
    pub paid_out_npr: Money,
    /// Teacher net still owed (pending or under complaint).
    pub pending_npr: Money,
    pub paid_out_count: u64,
    pub pending_count: u64,
    pub reverted_count: u64,
    pub by_payer_currency: Vec<CurrencyTotals>,
}

impl EarningsSummary {
    fn from_transactions(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        txs: &[Transaction],
    ) -> Self {
        let mut summary = Self {
            from,
            to,
            transactions: 0,
            gross_npr: Money::ZERO,
            platform_fee_npr: Money::ZERO,
            teacher_amount_npr: Money::ZERO,
            paid_out_npr: Money::ZERO,
            pending_npr: Money::ZERO,
            paid_out_count: 0,
            pending_count: 0,
            reverted_count: 0,
            by_payer_currency: Vec::new(),
        };
        let mut per_currency: BTreeMap<CurrencyCode, CurrencyTotals> = BTreeMap::new();

        for tx in txs {
            summary.transactions += 1;
            let totals = per_currency
                .entry(tx.payer_currency.clone())
                .or_insert_with(|| CurrencyTotals::new(tx.payer_currency.clone()));
            totals.transactions += 1;

            if tx.status == TransactionStatus::RevertedToLearner {
                summary.reverted_count += 1;
                totals.refunded += tx.revert_refund_amount.unwrap_or(Money::ZERO);
                continue;
            }

            totals.amount_paid += tx.amount_paid;
            totals.platform_fee += tx.platform_fee_amount;
            totals.teacher_amount += tx.teacher_amount;

            summary.gross_npr += tx.amount_paid_npr;
            summary.platform_fee_npr += tx.platform_fee_amount_npr;
            summary.teacher_amount_npr += tx.teacher_amount_npr;
            match tx.status {
                TransactionStatus::PaidToTeacher => {
                    summary.paid_out_count += 1;
                    summary.paid_out_npr += tx.teacher_amount_npr;
                }
                TransactionStatus::PendingPayout | TransactionStatus::ComplaintRaised => {
                    summary.pending_count += 1;
                    summary.pending_npr += tx.teacher_amount_npr;
                }
                TransactionStatus::RevertedToLearner => {}
            }
        }

        summary.by_payer_currency = per_currency.into_values().collect();
        summary
    }
}

impl Engine {
    /// Aggregates transactions created in `[from, to)`.
    pub async fn earnings_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> ResultEngine<EarningsSummary> {
        if let (Some(from), Some(to)) = (from, to)
            && from >= to
        {
            return Err(EngineError::InvalidAmount(
                "invalid range: from must be < to".to_string(),
            ));
        }

        let mut query = transactions::Entity::find().order_by_asc(transactions::Column::CreatedAt);
        if let Some(from) = from {
            query = query.filter(transactions::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(transactions::Column::CreatedAt.lt(to));
        }
        let txs = query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(EarningsSummary::from_transactions(from, to, &txs))
    }
}
