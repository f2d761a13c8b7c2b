//! Multi-currency settlement engine for a skill-exchange marketplace.
//!
//! Learners pay for sessions in their own currency, the platform keeps a
//! percentage, and teachers are paid out in theirs. Every amount is also
//! normalized into a pivot currency (`NPR`) for accounting. Conversions go
//! through USD using per-currency buy/sell rates maintained by admins.
//!
//! The pure computations ([`convert`], [`compute_fee`], [`compute_payout`])
//! have no I/O. The [`Engine`] persists transactions, complaints and the
//! platform configuration with sea-orm and drives their state machines.

pub use commands::{
    AdminProofCmd, MarkPaidCmd, NewPaymentDetail, RaiseComplaintCmd, RateCorrectionCmd,
    ResolveReassignCmd, RevertCmd, SessionPayment,
};
pub use complaints::{ComplaintResolution, ComplaintRole, ComplaintStatus, PaymentComplaint};
pub use convert::convert;
pub use currency::{
    CountryCurrencyMap, CurrencyCode, CurrencyRate, CurrencyTable, PIVOT_CURRENCY,
    REFERENCE_CURRENCY,
};
pub use error::EngineError;
pub use fees::{DEFAULT_FEE_PERCENT, FeePercent, FeeSplit, Settlement, compute_fee};
pub use money::Money;
pub use notify::{
    CollaboratorError, EventKind, NoopSessionLinks, Notifier, RelatedModel, SessionLinks,
    SettlementEvent, TracingNotifier,
};
pub use ops::{CurrencyTotals, EarningsSummary, Engine, EngineBuilder, TransactionListFilter};
pub use payout::{
    Payout, PayoutOverride, RATE_SCALE, RateSource, apply_rate, auto_rate, compute_payout,
};
pub use platform_config::{Country, PaymentDetail, PlatformConfig};
pub use rate_history::RateHistoryEntry;
pub use transactions::{Transaction, TransactionStatus};

mod commands;
mod complaints;
mod convert;
mod currency;
mod error;
mod fees;
mod money;
mod notify;
mod ops;
mod payout;
mod platform_config;
mod rate_history;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
