//! The module contains the errors the ledger engine can return.
//!
//! Every operation reports failure through one of these variants; the
//! boundary (shell or any other front-end) renders them as plain messages.
//! `Consistency` is reserved for multi-row invariant breaks (split shares
//! that do not reconcile, deletions that would orphan shared history) and
//! always implies that nothing was committed.

use sea_orm::DbErr;
use thiserror::Error;

/// Ledger engine errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("\"{0}\" already exists")]
    Duplicate(String),
    #[error("consistency violation: {0}")]
    Consistency(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Duplicate(a), Self::Duplicate(b)) => a == b,
            (Self::Consistency(a), Self::Consistency(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
