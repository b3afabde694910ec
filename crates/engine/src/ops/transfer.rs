//! CSV bulk transfer for the personal and group ledgers.
//!
//! Import is row-atomic: every data row runs as its own transaction, a bad
//! row is recorded in the report with its 1-based index and the batch keeps
//! going. Only an unreadable file aborts the whole import.

use std::path::Path;

use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::Deserialize;

use crate::{LedgerError, ResultLedger, Session, expenses, group_expenses, groups};

use super::Engine;
use super::expenses::{ExpenseRow, parse_date};
use super::groups::GroupExpenseRow;

/// Sort key for CSV exports, parsed from the shell's `sort-on` argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportSort {
    Date,
    Amount,
    Category,
    PaymentMethod,
    Tags,
}

impl TryFrom<&str> for ExportSort {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "amount" => Ok(Self::Amount),
            "category" => Ok(Self::Category),
            "payment_method" => Ok(Self::PaymentMethod),
            "tags" => Ok(Self::Tags),
            other => Err(LedgerError::Validation(format!(
                "unknown sort field \"{other}\""
            ))),
        }
    }
}

/// Outcome of a bulk import. `skipped` holds `(row index, reason)` pairs
/// for the rows that did not make it in; row indexes are 1-based over the
/// data rows, the header not counted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<(usize, String)>,
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    amount: String,
    category: String,
    payment_method: String,
    date: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupImportRow {
    amount: String,
    category: String,
    payment_method: String,
    date: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    participants: Option<String>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|joined| {
        joined
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn open_error(path: &Path, err: csv::Error) -> LedgerError {
    LedgerError::Validation(format!("cannot open {}: {err}", path.display()))
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Validation(format!("cannot write {}: {err}", path.display()))
}

impl Engine {
    /// Imports personal expenses for the caller from a CSV file. Columns
    /// the exporter adds (`id`, `owner`) are ignored, so an exported file
    /// imports back as-is.
    pub async fn import_expenses(
        &self,
        session: &Session,
        path: &Path,
    ) -> ResultLedger<ImportReport> {
        let mut reader = csv::Reader::from_path(path).map_err(|err| open_error(path, err))?;
        let mut report = ImportReport::default();
        for (index, record) in reader.deserialize::<ImportRow>().enumerate() {
            let row_index = index + 1;
            match self.import_personal_row(session, record).await {
                Ok(()) => report.imported += 1,
                Err(err) => report.skipped.push((row_index, err.to_string())),
            }
        }
        tracing::info!(
            "imported {} row(s) from {}, skipped {}",
            report.imported,
            path.display(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn import_personal_row(
        &self,
        session: &Session,
        record: Result<ImportRow, csv::Error>,
    ) -> ResultLedger<()> {
        let row =
            record.map_err(|err| LedgerError::Validation(format!("malformed row: {err}")))?;
        let amount = row.amount.parse()?;
        let date = parse_date(&row.date)?;
        let tags = split_list(row.tags.as_deref());
        self.add_expense(
            session,
            amount,
            &row.category,
            &row.payment_method,
            date,
            row.description.as_deref(),
            &tags,
        )
        .await?;
        Ok(())
    }

    /// Imports shared expenses into one group. A row that names
    /// participants splits between them (plus the caller); a row without
    /// any splits between all current members.
    pub async fn import_group_csv(
        &self,
        session: &Session,
        group_name: &str,
        path: &Path,
    ) -> ResultLedger<ImportReport> {
        let mut reader = csv::Reader::from_path(path).map_err(|err| open_error(path, err))?;
        let mut report = ImportReport::default();
        for (index, record) in reader.deserialize::<GroupImportRow>().enumerate() {
            let row_index = index + 1;
            match self.import_group_row(session, group_name, record).await {
                Ok(()) => report.imported += 1,
                Err(err) => report.skipped.push((row_index, err.to_string())),
            }
        }
        tracing::info!(
            "imported {} group row(s) from {}, skipped {}",
            report.imported,
            path.display(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn import_group_row(
        &self,
        session: &Session,
        group_name: &str,
        record: Result<GroupImportRow, csv::Error>,
    ) -> ResultLedger<()> {
        let row =
            record.map_err(|err| LedgerError::Validation(format!("malformed row: {err}")))?;
        let amount = row.amount.parse()?;
        let date = parse_date(&row.date)?;
        let tags = split_list(row.tags.as_deref());
        let mut participants = split_list(row.participants.as_deref());
        if participants.is_empty() {
            participants = self.group_members(session, group_name).await?;
        }
        self.add_group_expense(
            session,
            amount,
            group_name,
            &row.category,
            &row.payment_method,
            date,
            row.description.as_deref(),
            &tags,
            &participants,
        )
        .await?;
        Ok(())
    }

    /// Exports the caller's ledger to a CSV file and returns the row
    /// count. An Admin exports every user's rows with a leading `owner`
    /// column; other callers get their own rows without it.
    pub async fn export_csv(
        &self,
        session: &Session,
        path: &Path,
        sort: ExportSort,
    ) -> ResultLedger<usize> {
        let with_owner = session.is_admin();
        let mut rows = self.export_rows(session).await?;
        sort_personal(&mut rows, sort);

        let mut writer = csv::Writer::from_path(path).map_err(|err| write_error(path, err))?;
        let mut header = vec!["id", "amount", "category", "payment_method", "date", "description", "tags"];
        if with_owner {
            header.insert(0, "owner");
        }
        writer
            .write_record(&header)
            .map_err(|err| write_error(path, err))?;
        for row in &rows {
            let mut record = vec![
                row.id.to_string(),
                row.amount.to_string(),
                row.category.clone(),
                row.payment_method.clone(),
                row.date.to_string(),
                row.description.clone().unwrap_or_default(),
                row.tags.join(","),
            ];
            if with_owner {
                record.insert(0, row.owner.clone());
            }
            writer
                .write_record(&record)
                .map_err(|err| write_error(path, err))?;
        }
        writer.flush().map_err(|err| write_error(path, err))?;
        Ok(rows.len())
    }

    /// Exports one group's ledger, group metadata and the per-row split
    /// attached. `participants` and `split_amounts` are comma-joined and
    /// positionally aligned.
    pub async fn export_group_csv(
        &self,
        session: &Session,
        group_name: &str,
        path: &Path,
        sort: ExportSort,
    ) -> ResultLedger<usize> {
        let (group, mut rows) = self.group_export_rows(session, group_name).await?;
        sort_group(&mut rows, sort);

        let mut writer = csv::Writer::from_path(path).map_err(|err| write_error(path, err))?;
        writer
            .write_record([
                "id",
                "amount",
                "category",
                "payment_method",
                "date",
                "description",
                "tags",
                "group",
                "group_description",
                "group_created",
                "created_by",
                "participants",
                "split_amounts",
            ])
            .map_err(|err| write_error(path, err))?;
        for row in &rows {
            let participants: Vec<&str> =
                row.splits.iter().map(|(name, _)| name.as_str()).collect();
            let amounts: Vec<String> =
                row.splits.iter().map(|(_, share)| share.to_string()).collect();
            writer
                .write_record([
                    row.id.to_string(),
                    row.amount.to_string(),
                    row.category.clone(),
                    row.payment_method.clone(),
                    row.date.to_string(),
                    row.description.clone().unwrap_or_default(),
                    row.tags.join(","),
                    group.name.clone(),
                    group.description.clone().unwrap_or_default(),
                    group.created_on.to_string(),
                    row.created_by.clone(),
                    participants.join(","),
                    amounts.join(","),
                ])
                .map_err(|err| write_error(path, err))?;
        }
        writer.flush().map_err(|err| write_error(path, err))?;
        Ok(rows.len())
    }

    async fn export_rows(&self, session: &Session) -> ResultLedger<Vec<ExpenseRow>> {
        let username = session.username.clone();
        let all_users = session.is_admin();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let mut query = expenses::Entity::find().order_by_asc(expenses::Column::Id);
                if !all_users {
                    query = query.filter(expenses::Column::UserId.eq(username));
                }
                let models = query.all(db_tx).await?;
                engine.hydrate_expenses(db_tx, models).await
            })
        })
        .await
    }

    async fn group_export_rows(
        &self,
        session: &Session,
        group_name: &str,
    ) -> ResultLedger<(groups::Model, Vec<GroupExpenseRow>)> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;
                let models = group_expenses::Entity::find()
                    .filter(group_expenses::Column::GroupId.eq(group.id))
                    .order_by_asc(group_expenses::Column::Id)
                    .all(db_tx)
                    .await?;
                let rows = engine.hydrate_group_expenses(db_tx, &group, models).await?;
                Ok((group, rows))
            })
        })
        .await
    }
}

fn sort_personal(rows: &mut [ExpenseRow], sort: ExportSort) {
    match sort {
        ExportSort::Date => rows.sort_by(|a, b| a.date.cmp(&b.date)),
        ExportSort::Amount => rows.sort_by(|a, b| a.amount.cmp(&b.amount)),
        ExportSort::Category => rows.sort_by(|a, b| a.category.cmp(&b.category)),
        ExportSort::PaymentMethod => {
            rows.sort_by(|a, b| a.payment_method.cmp(&b.payment_method))
        }
        ExportSort::Tags => rows.sort_by(|a, b| a.tags.cmp(&b.tags)),
    }
}

fn sort_group(rows: &mut [GroupExpenseRow], sort: ExportSort) {
    match sort {
        ExportSort::Date => rows.sort_by(|a, b| a.date.cmp(&b.date)),
        ExportSort::Amount => rows.sort_by(|a, b| a.amount.cmp(&b.amount)),
        ExportSort::Category => rows.sort_by(|a, b| a.category.cmp(&b.category)),
        ExportSort::PaymentMethod => {
            rows.sort_by(|a, b| a.payment_method.cmp(&b.payment_method))
        }
        ExportSort::Tags => rows.sort_by(|a, b| a.tags.cmp(&b.tags)),
    }
}
