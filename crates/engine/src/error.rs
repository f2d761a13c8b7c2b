//! The module contains the errors the settlement engine can return.
//!
//! Errors fall in four families:
//!
//! - validation ([`InvalidAmount`], [`InvalidRate`], [`InvalidCurrency`],
//!   [`InvalidId`], [`InvalidCursor`], [`Forbidden`]): bad input, rejected
//!   before any state change;
//! - [`Conflict`]: the record is in a state incompatible with the requested
//!   transition. The message carries the current status so callers can
//!   refresh;
//! - [`KeyNotFound`]: unknown transaction, complaint or configuration row;
//! - infrastructure ([`Collaborator`], [`Database`]).
//!
//! Missing or zero currency rates are **not** errors: conversions degrade to
//! documented defaults and log a warning instead.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidRate`]: EngineError::InvalidRate
//!  [`InvalidCurrency`]: EngineError::InvalidCurrency
//!  [`InvalidId`]: EngineError::InvalidId
//!  [`InvalidCursor`]: EngineError::InvalidCursor
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`Conflict`]: EngineError::Conflict
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Collaborator`]: EngineError::Collaborator
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Collaborator failed: {0}")]
    Collaborator(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for errors caused by the caller's input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidRate(_)
                | Self::InvalidCurrency(_)
                | Self::InvalidId(_)
                | Self::InvalidCursor(_)
                | Self::Forbidden(_)
        )
    }

    /// Returns `true` when the record was in an incompatible state.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidRate(a), Self::InvalidRate(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Collaborator(a), Self::Collaborator(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
