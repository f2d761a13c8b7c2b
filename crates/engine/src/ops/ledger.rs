use sea_orm::{ConnectionTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, RateHistoryEntry, ResultEngine, Transaction, complaints, rate_history,
    transactions,
};

use super::{Engine, load_history, load_transaction, require_transaction_model, with_tx};

mod list;
mod settle;

pub use list::TransactionListFilter;
pub(super) use settle::revert_in_tx;

impl Engine {
    /// Returns a transaction with its full exchange-rate history.
    pub async fn transaction(&self, transaction_id: Uuid) -> ResultEngine<Transaction> {
        load_transaction(&self.database, transaction_id).await
    }

    /// Returns the transaction recorded for a booking session.
    pub async fn transaction_by_session(&self, session_id: &str) -> ResultEngine<Transaction> {
        find_by_session(&self.database, session_id.trim())
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not found".to_string()))
    }

    /// Returns the append-only rate history of a transaction, oldest first.
    pub async fn rate_history(&self, transaction_id: Uuid) -> ResultEngine<Vec<RateHistoryEntry>> {
        require_transaction_model(&self.database, transaction_id).await?;
        load_history(&self.database, transaction_id).await
    }

    /// Deletes a transaction together with its rate history and complaints.
    ///
    /// This is an admin operation for removing bogus records; settled data
    /// is otherwise never deleted.
    pub async fn purge_transaction(&self, transaction_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_transaction_model(&db_tx, transaction_id).await?;
            let id = transaction_id.to_string();
            rate_history::Entity::delete_many()
                .filter(rate_history::Column::TransactionId.eq(id.clone()))
                .exec(&db_tx)
                .await?;
            complaints::Entity::delete_many()
                .filter(complaints::Column::TransactionId.eq(id.clone()))
                .exec(&db_tx)
                .await?;
            transactions::Entity::delete_by_id(id).exec(&db_tx).await?;
            tracing::warn!(%transaction_id, "transaction purged");
            Ok(())
        })
    }
}

async fn find_by_session<C: ConnectionTrait>(
    db: &C,
    session_id: &str,
) -> ResultEngine<Option<Transaction>> {
    let Some(model) = transactions::Entity::find()
        .filter(transactions::Column::SessionId.eq(session_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    let mut tx = Transaction::try_from(model)?;
    tx.exchange_rate_history = load_history(db, tx.id).await?;
    Ok(Some(tx))
}
