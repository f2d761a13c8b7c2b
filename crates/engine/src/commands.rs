//! Command structs for engine operations.
//!
//! These types group parameters for write operations (payment creation,
//! payout, revert, complaint handling), keeping call sites readable and
//! avoiding long argument lists. Optional fields are set through builder
//! methods.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{CurrencyCode, FeePercent, Money};

/// "Payment is due" event produced by the booking side when a session is
/// accepted.
#[derive(Clone, Debug)]
pub struct SessionPayment {
    pub session_id: String,
    pub learner_id: String,
    pub teacher_id: String,
    pub amount: Money,
    /// Currency the learner paid in. Inferred from `learner_country` when
    /// absent.
    pub currency: Option<CurrencyCode>,
    pub learner_country: Option<String>,
    /// Currency the teacher wants to be paid in. Inferred from
    /// `teacher_country` when absent.
    pub payout_currency: Option<CurrencyCode>,
    pub teacher_country: Option<String>,
    pub is_free: bool,
    pub occurred_at: DateTime<Utc>,
}

impl SessionPayment {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        learner_id: impl Into<String>,
        teacher_id: impl Into<String>,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            learner_id: learner_id.into(),
            teacher_id: teacher_id.into(),
            amount,
            currency: None,
            learner_country: None,
            payout_currency: None,
            teacher_country: None,
            is_free: false,
            occurred_at,
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn learner_country(mut self, country: impl Into<String>) -> Self {
        self.learner_country = Some(country.into());
        self
    }

    #[must_use]
    pub fn payout_currency(mut self, currency: CurrencyCode) -> Self {
        self.payout_currency = Some(currency);
        self
    }

    #[must_use]
    pub fn teacher_country(mut self, country: impl Into<String>) -> Self {
        self.teacher_country = Some(country.into());
        self
    }

    #[must_use]
    pub fn free(mut self) -> Self {
        self.is_free = true;
        self
    }
}

/// Admin marks a pending transaction as paid to the teacher.
///
/// `rate` and `amount` are the values the admin actually used; blank (absent
/// or zero) values are computed by the engine.
#[derive(Clone, Debug)]
pub struct MarkPaidCmd {
    pub admin_id: String,
    pub at: DateTime<Utc>,
    pub fee_percent: Option<FeePercent>,
    pub rate: Option<Decimal>,
    pub amount: Option<Money>,
    pub note: Option<String>,
}

impl MarkPaidCmd {
    #[must_use]
    pub fn new(admin_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            admin_id: admin_id.into(),
            at,
            fee_percent: None,
            rate: None,
            amount: None,
            note: None,
        }
    }

    /// Overrides the fee percent recorded at creation.
    #[must_use]
    pub fn fee_percent(mut self, fee_percent: FeePercent) -> Self {
        self.fee_percent = Some(fee_percent);
        self
    }

    #[must_use]
    pub fn rate(mut self, rate: Decimal) -> Self {
        self.rate = Some(rate);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Refund a transaction to the learner, optionally keeping a deduction.
#[derive(Clone, Debug)]
pub struct RevertCmd {
    pub admin_id: String,
    pub at: DateTime<Utc>,
    /// Amount kept by the platform, in payer currency. Clamped to
    /// `[0, amount_paid]`.
    pub deduction: Money,
    pub note: Option<String>,
}

impl RevertCmd {
    #[must_use]
    pub fn new(admin_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            admin_id: admin_id.into(),
            at,
            deduction: Money::ZERO,
            note: None,
        }
    }

    #[must_use]
    pub fn deduction(mut self, deduction: Money) -> Self {
        self.deduction = deduction;
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Close a complaint in the teacher's favour.
#[derive(Clone, Debug)]
pub struct ResolveReassignCmd {
    pub admin_id: String,
    pub at: DateTime<Utc>,
    pub new_meeting_link: Option<String>,
    pub notes: Option<String>,
}

impl ResolveReassignCmd {
    #[must_use]
    pub fn new(admin_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            admin_id: admin_id.into(),
            at,
            new_meeting_link: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn new_meeting_link(mut self, link: impl Into<String>) -> Self {
        self.new_meeting_link = Some(link.into());
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Open a dispute on a transaction.
#[derive(Clone, Debug)]
pub struct RaiseComplaintCmd {
    pub transaction_id: Uuid,
    pub raised_by: String,
    pub reason: String,
    pub proof_urls: Vec<String>,
    pub at: DateTime<Utc>,
}

impl RaiseComplaintCmd {
    #[must_use]
    pub fn new(
        transaction_id: Uuid,
        raised_by: impl Into<String>,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            raised_by: raised_by.into(),
            reason: reason.into(),
            proof_urls: Vec::new(),
            at,
        }
    }

    #[must_use]
    pub fn proof_url(mut self, url: impl Into<String>) -> Self {
        self.proof_urls.push(url.into());
        self
    }
}

/// Admin attaches proof to a complaint.
#[derive(Clone, Debug)]
pub struct AdminProofCmd {
    pub admin_id: String,
    pub proof_urls: Vec<String>,
    pub notes: Option<String>,
}

impl AdminProofCmd {
    #[must_use]
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            proof_urls: Vec::new(),
            notes: None,
        }
    }

    #[must_use]
    pub fn proof_url(mut self, url: impl Into<String>) -> Self {
        self.proof_urls.push(url.into());
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Record a corrected payout rate on an already settled transaction.
#[derive(Clone, Debug)]
pub struct RateCorrectionCmd {
    pub admin_id: String,
    pub at: DateTime<Utc>,
    pub rate: Decimal,
    /// Computed from the pivot net amount and `rate` when absent.
    pub payout_amount: Option<Money>,
    pub note: Option<String>,
}

impl RateCorrectionCmd {
    #[must_use]
    pub fn new(admin_id: impl Into<String>, rate: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            admin_id: admin_id.into(),
            at,
            rate,
            payout_amount: None,
            note: None,
        }
    }

    #[must_use]
    pub fn payout_amount(mut self, amount: Money) -> Self {
        self.payout_amount = Some(amount);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Company account learners send money to.
#[derive(Clone, Debug)]
pub struct NewPaymentDetail {
    pub method: String,
    pub account_name: String,
    pub account_number: String,
    pub currency: CurrencyCode,
    pub instructions: Option<String>,
}

impl NewPaymentDetail {
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        account_name: impl Into<String>,
        account_number: impl Into<String>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            method: method.into(),
            account_name: account_name.into(),
            account_number: account_number.into(),
            currency,
            instructions: None,
        }
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}
