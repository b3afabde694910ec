use std::{future::Future, pin::Pin};

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, SqlErr, TransactionTrait};

use crate::{LedgerError, ResultLedger};

mod access;
pub(crate) mod expenses;
pub(crate) mod groups;
pub(crate) mod reports;
mod taxonomy;
pub(crate) mod transfer;
mod users;

pub use expenses::{ExpenseField, ExpenseFilter};
pub use users::UserField;

type TxFuture<'c, T> = Pin<Box<dyn Future<Output = ResultLedger<T>> + Send + 'c>>;

/// The ledger engine. Owns the database connection; every operation of the
/// taxonomy, identity, ledger, splitter, reporting and bulk-transfer
/// components hangs off this handle and takes an explicit [`Session`].
///
/// [`Session`]: crate::Session
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    admin_group_override: bool,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Runs a block inside a DB transaction, committing on success and
    /// rolling back on error. Mutating operations are atomic through this:
    /// a failure partway through a multi-statement sequence leaves nothing
    /// behind.
    pub(crate) async fn with_tx<T, F>(&self, run: F) -> ResultLedger<T>
    where
        F: for<'c> FnOnce(&'c Engine, &'c DatabaseTransaction) -> TxFuture<'c, T>,
    {
        let db_tx = self.database.begin().await?;
        let result = run(self, &db_tx).await;
        match result {
            Ok(value) => {
                db_tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!("transaction rolled back: {err}");
                db_tx.rollback().await.ok();
                Err(err)
            }
        }
    }
}

/// Trims and lower-cases a taxonomy name; empty names are invalid.
/// Lookups run through the same normalization, so matching is
/// case-insensitive while the stored form stays canonical.
fn normalize_name(value: &str, label: &str) -> ResultLedger<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_lowercase())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Maps a unique-index violation to [`LedgerError::Duplicate`]. The
/// constraint is the authoritative duplicate signal; callers never pre-check
/// existence before inserting.
fn map_unique_violation(err: DbErr, name: &str) -> LedgerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::Duplicate(name.to_string()),
        _ => LedgerError::Database(err),
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    admin_group_override: Option<bool>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Whether an Admin may act on any group without being a member.
    /// Resolved once here and applied uniformly to every group operation.
    /// Defaults to `true`.
    pub fn admin_group_override(mut self, enabled: bool) -> EngineBuilder {
        self.admin_group_override = Some(enabled);
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
            admin_group_override: self.admin_group_override.unwrap_or(true),
        }
    }
}
