use std::{fmt, sync::Arc};

use sea_orm::{ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    ComplaintStatus, EngineError, Notifier, NoopSessionLinks, PlatformConfig, ResultEngine,
    SessionLinks, SettlementEvent, Transaction, TransactionStatus, TracingNotifier, complaints,
    rate_history, transactions,
};

mod config;
mod disputes;
mod ledger;
mod reports;

pub use reports::{CurrencyTotals, EarningsSummary};
pub use ledger::TransactionListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    session_links: Arc<dyn SessionLinks>,
    default_config: PlatformConfig,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Delivers events collected by a committed operation.
    async fn emit(&self, events: Vec<SettlementEvent>) {
        for event in events {
            if let Err(err) = self.notifier.notify(&event).await {
                tracing::warn!(
                    kind = event.kind.as_str(),
                    user_id = %event.user_id,
                    related_id = %event.related_id,
                    error = %err,
                    "notification failed"
                );
            }
        }
    }
}

async fn require_transaction_model<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<transactions::Model> {
    transactions::Entity::find_by_id(transaction_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("transaction not found".to_string()))
}

async fn load_history<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<Vec<crate::RateHistoryEntry>> {
    let models = rate_history::Entity::find()
        .filter(rate_history::Column::TransactionId.eq(transaction_id.to_string()))
        .order_by_asc(rate_history::Column::Seq)
        .all(db)
        .await?;
    models
        .into_iter()
        .map(crate::RateHistoryEntry::try_from)
        .collect()
}

/// Reads a transaction together with its rate history.
async fn load_transaction<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<Transaction> {
    let model = require_transaction_model(db, transaction_id).await?;
    let mut tx = Transaction::try_from(model)?;
    tx.exchange_rate_history = load_history(db, transaction_id).await?;
    Ok(tx)
}

/// Applies `changes` only if the row is still in `expected` status.
///
/// Zero affected rows means another request moved the transaction first; the
/// conflict reports the status it has now.
async fn update_transaction_guarded<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
    expected: TransactionStatus,
    changes: transactions::ActiveModel,
) -> ResultEngine<()> {
    let result = transactions::Entity::update_many()
        .set(changes)
        .filter(transactions::Column::Id.eq(transaction_id.to_string()))
        .filter(transactions::Column::Status.eq(expected.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        let current = require_transaction_model(db, transaction_id).await?;
        let status = TransactionStatus::try_from(current.status.as_str())?;
        return Err(status.conflict());
    }
    Ok(())
}

/// Applies `changes` only if the complaint is still awaiting a decision.
async fn update_complaint_guarded<C: ConnectionTrait>(
    db: &C,
    complaint_id: Uuid,
    changes: complaints::ActiveModel,
) -> ResultEngine<()> {
    let result = complaints::Entity::update_many()
        .set(changes)
        .filter(complaints::Column::Id.eq(complaint_id.to_string()))
        .filter(complaints::Column::Status.is_in(ComplaintStatus::active()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        let current = complaints::Entity::find_by_id(complaint_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("complaint not found".to_string()))?;
        return Err(EngineError::Conflict(format!(
            "complaint already closed (status: {})",
            current.status
        )));
    }
    Ok(())
}

/// Appends `addition` to an existing free-text note, one entry per line.
fn append_note(existing: Option<String>, addition: Option<String>) -> Option<String> {
    match (existing, addition) {
        (Some(existing), Some(addition)) => Some(format!("{existing}\n{addition}")),
        (existing, None) => existing,
        (None, addition) => addition,
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    session_links: Arc<dyn SessionLinks>,
    default_config: PlatformConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            notifier: Arc::new(TracingNotifier),
            session_links: Arc::new(NoopSessionLinks),
            default_config: PlatformConfig::default(),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Receiver of settlement events. Defaults to [`TracingNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = notifier;
        self
    }

    /// Meeting-link collaborator used by reassign resolutions.
    pub fn session_links(mut self, session_links: Arc<dyn SessionLinks>) -> EngineBuilder {
        self.session_links = session_links;
        self
    }

    /// Configuration stored the first time the platform config is read.
    pub fn default_config(mut self, config: PlatformConfig) -> EngineBuilder {
        self.default_config = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            notifier: self.notifier,
            session_links: self.session_links,
            default_config: self.default_config,
        })
    }
}
