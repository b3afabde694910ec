//! Personal ledger: record, update, delete and list expenses.

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};

use crate::{
    LedgerError, Money, ResultLedger, Session, categories, expense_tags, expenses,
    payment_methods, tags,
};

use super::{Engine, normalize_optional_text};

/// Expense fields exposed to `update_expense`. Closed set: the wire name is
/// parsed into this enum, never interpolated into a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseField {
    Amount,
    Date,
    Description,
    Category,
    PaymentMethod,
    Tags,
}

impl TryFrom<&str> for ExpenseField {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "amount" => Ok(Self::Amount),
            "date" => Ok(Self::Date),
            "description" => Ok(Self::Description),
            "category" => Ok(Self::Category),
            "payment_method" => Ok(Self::PaymentMethod),
            "tags" => Ok(Self::Tags),
            other => Err(LedgerError::Validation(format!(
                "invalid expense field: {other}"
            ))),
        }
    }
}

/// Supported listing filters. Filters combine conjunctively; unsupported
/// keys cannot be expressed at all.
#[derive(Clone, Debug)]
pub enum ExpenseFilter {
    Category(String),
    PaymentMethod(String),
    MinAmount(Money),
    MaxAmount(Money),
    Date(NaiveDate),
    Tag(String),
}

impl ExpenseFilter {
    /// Parses a `--key=value` pair from the command surface.
    pub fn parse(key: &str, value: &str) -> ResultLedger<Self> {
        match key {
            "category" => Ok(Self::Category(value.to_string())),
            "payment_method" => Ok(Self::PaymentMethod(value.to_string())),
            "min_amount" => Ok(Self::MinAmount(value.parse()?)),
            "max_amount" => Ok(Self::MaxAmount(value.parse()?)),
            "date" => Ok(Self::Date(parse_date(value)?)),
            "tag" => Ok(Self::Tag(value.to_string())),
            other => Err(LedgerError::Validation(format!(
                "invalid filter key: {other}"
            ))),
        }
    }
}

/// A ledger row with taxonomy names resolved and the tag set attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseRow {
    pub id: i32,
    pub owner: String,
    pub amount: Money,
    pub category: String,
    pub payment_method: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

pub(crate) fn parse_date(value: &str) -> ResultLedger<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| LedgerError::Validation(format!("invalid date: {value}")))
}

fn require_positive(amount: Money) -> ResultLedger<Money> {
    if !amount.is_positive() {
        return Err(LedgerError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

impl Engine {
    /// Records an expense for the caller. Returns the new expense id.
    ///
    /// Category and payment method must already be registered; tags that are
    /// not are created as a side effect of this call.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_expense(
        &self,
        session: &Session,
        amount: Money,
        category: &str,
        payment_method: &str,
        date: NaiveDate,
        description: Option<&str>,
        tags: &[String],
    ) -> ResultLedger<i32> {
        let username = session.username.clone();
        let category = category.to_string();
        let payment_method = payment_method.to_string();
        let description = normalize_optional_text(description);
        let tags = tags.to_vec();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .insert_expense(
                        db_tx,
                        &username,
                        amount,
                        &category,
                        &payment_method,
                        date,
                        description,
                        &tags,
                    )
                    .await
            })
        })
        .await
    }

    /// One-expense insert shared by `add_expense` and CSV import. Runs on
    /// the caller's transaction.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn insert_expense(
        &self,
        db: &DatabaseTransaction,
        username: &str,
        amount: Money,
        category: &str,
        payment_method: &str,
        date: NaiveDate,
        description: Option<String>,
        tags: &[String],
    ) -> ResultLedger<i32> {
        let amount = require_positive(amount)?;
        let category = self.resolve_category(db, category).await?;
        let payment_method = self.resolve_payment_method(db, payment_method).await?;

        let inserted = expenses::ActiveModel {
            user_id: ActiveValue::Set(username.to_string()),
            amount_minor: ActiveValue::Set(amount.minor()),
            category_id: ActiveValue::Set(category.id),
            payment_method_id: ActiveValue::Set(payment_method.id),
            date: ActiveValue::Set(date),
            description: ActiveValue::Set(description),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let tag_ids = self.resolve_or_create_tags(db, tags).await?;
        for tag_id in tag_ids {
            expense_tags::ActiveModel {
                expense_id: ActiveValue::Set(inserted.id),
                tag_id: ActiveValue::Set(tag_id),
            }
            .insert(db)
            .await?;
        }

        Ok(inserted.id)
    }

    /// Updates one field of an owned expense.
    pub async fn update_expense(
        &self,
        session: &Session,
        expense_id: i32,
        field: ExpenseField,
        value: &str,
    ) -> ResultLedger<()> {
        let username = session.username.clone();
        let value = value.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let expense = engine
                    .require_owned_expense(db_tx, expense_id, &username)
                    .await?;

                let mut active = expenses::ActiveModel {
                    id: ActiveValue::Set(expense.id),
                    ..Default::default()
                };
                match field {
                    ExpenseField::Amount => {
                        let amount = require_positive(value.parse()?)?;
                        active.amount_minor = ActiveValue::Set(amount.minor());
                    }
                    ExpenseField::Date => {
                        active.date = ActiveValue::Set(parse_date(&value)?);
                    }
                    ExpenseField::Description => {
                        active.description =
                            ActiveValue::Set(normalize_optional_text(Some(&value)));
                    }
                    ExpenseField::Category => {
                        let category = engine.resolve_category(db_tx, &value).await?;
                        active.category_id = ActiveValue::Set(category.id);
                    }
                    ExpenseField::PaymentMethod => {
                        let method = engine.resolve_payment_method(db_tx, &value).await?;
                        active.payment_method_id = ActiveValue::Set(method.id);
                    }
                    ExpenseField::Tags => {
                        // Replaces the whole association set, not additive.
                        let names: Vec<String> = value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(ToString::to_string)
                            .collect();
                        let tag_ids = engine.resolve_or_create_tags(db_tx, &names).await?;
                        expense_tags::Entity::delete_many()
                            .filter(expense_tags::Column::ExpenseId.eq(expense.id))
                            .exec(db_tx)
                            .await?;
                        for tag_id in tag_ids {
                            expense_tags::ActiveModel {
                                expense_id: ActiveValue::Set(expense.id),
                                tag_id: ActiveValue::Set(tag_id),
                            }
                            .insert(db_tx)
                            .await?;
                        }
                        return Ok(());
                    }
                }
                active.update(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Deletes an owned expense, removing its tag links first.
    pub async fn delete_expense(&self, session: &Session, expense_id: i32) -> ResultLedger<()> {
        let username = session.username.clone();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let expense = engine
                    .require_owned_expense(db_tx, expense_id, &username)
                    .await?;
                expense_tags::Entity::delete_many()
                    .filter(expense_tags::Column::ExpenseId.eq(expense.id))
                    .exec(db_tx)
                    .await?;
                expenses::Entity::delete_by_id(expense.id).exec(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Lists the caller's expenses, newest date first. Filters are ANDed.
    pub async fn list_expenses(
        &self,
        session: &Session,
        filters: &[ExpenseFilter],
    ) -> ResultLedger<Vec<ExpenseRow>> {
        let username = session.username.clone();
        let filters = filters.to_vec();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let mut query = expenses::Entity::find()
                    .filter(expenses::Column::UserId.eq(username))
                    .order_by_desc(expenses::Column::Date)
                    .order_by_desc(expenses::Column::Id);

                for filter in &filters {
                    query = match filter {
                        ExpenseFilter::Category(name) => {
                            let category = engine.resolve_category(db_tx, name).await?;
                            query.filter(expenses::Column::CategoryId.eq(category.id))
                        }
                        ExpenseFilter::PaymentMethod(name) => {
                            let method = engine.resolve_payment_method(db_tx, name).await?;
                            query.filter(expenses::Column::PaymentMethodId.eq(method.id))
                        }
                        ExpenseFilter::MinAmount(min) => {
                            query.filter(expenses::Column::AmountMinor.gte(min.minor()))
                        }
                        ExpenseFilter::MaxAmount(max) => {
                            query.filter(expenses::Column::AmountMinor.lte(max.minor()))
                        }
                        ExpenseFilter::Date(date) => {
                            query.filter(expenses::Column::Date.eq(*date))
                        }
                        ExpenseFilter::Tag(name) => {
                            let Some(tag) = engine.find_tag(db_tx, name).await? else {
                                return Ok(Vec::new());
                            };
                            let tagged: Vec<i32> = expense_tags::Entity::find()
                                .select_only()
                                .column(expense_tags::Column::ExpenseId)
                                .filter(expense_tags::Column::TagId.eq(tag.id))
                                .into_tuple()
                                .all(db_tx)
                                .await?;
                            if tagged.is_empty() {
                                return Ok(Vec::new());
                            }
                            query.filter(expenses::Column::Id.is_in(tagged))
                        }
                    };
                }

                let models = query.all(db_tx).await?;
                engine.hydrate_expenses(db_tx, models).await
            })
        })
        .await
    }

    pub(super) async fn require_owned_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: i32,
        username: &str,
    ) -> ResultLedger<expenses::Model> {
        let expense = expenses::Entity::find_by_id(expense_id)
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("expense {expense_id}")))?;
        if expense.user_id != username {
            // Denied without detail: non-owners learn nothing further.
            return Err(LedgerError::Forbidden(format!("expense {expense_id}")));
        }
        Ok(expense)
    }

    /// Resolves taxonomy names and tag sets for a batch of expense rows.
    pub(super) async fn hydrate_expenses(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultLedger<Vec<ExpenseRow>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let category_names: HashMap<i32, String> = categories::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let method_names: HashMap<i32, String> = payment_methods::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect();

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let links = expense_tags::Entity::find()
            .filter(expense_tags::Column::ExpenseId.is_in(ids))
            .all(db)
            .await?;
        let tag_names: HashMap<i32, String> = tags::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        let mut tags_by_expense: HashMap<i32, Vec<String>> = HashMap::new();
        for link in links {
            if let Some(name) = tag_names.get(&link.tag_id) {
                tags_by_expense
                    .entry(link.expense_id)
                    .or_default()
                    .push(name.clone());
            }
        }

        let mut rows = Vec::with_capacity(models.len());
        for model in models {
            let mut row_tags = tags_by_expense.remove(&model.id).unwrap_or_default();
            row_tags.sort();
            rows.push(ExpenseRow {
                id: model.id,
                owner: model.user_id,
                amount: Money::new(model.amount_minor),
                category: category_names
                    .get(&model.category_id)
                    .cloned()
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("category {}", model.category_id))
                    })?,
                payment_method: method_names
                    .get(&model.payment_method_id)
                    .cloned()
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!(
                            "payment method {}",
                            model.payment_method_id
                        ))
                    })?,
                date: model.date,
                description: model.description,
                tags: row_tags,
            });
        }
        Ok(rows)
    }
}
