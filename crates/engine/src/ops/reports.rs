//! Reporting engine: read-only aggregations over the personal and group
//! ledgers. Every report is scoped by the caller's session; none mutate
//! state. Aggregations run in SQL and monetary values stay in minor units.

use chrono::NaiveDate;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, Statement,
    prelude::*,
};

use crate::{LedgerError, Money, ResultLedger, Session, expenses};

use super::{Engine, expenses::ExpenseRow};

/// One (year-month, category) aggregate of the caller's ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthlyCategorySpending {
    pub month: String,
    pub category: String,
    pub total: Money,
    pub count: i64,
}

/// The top spender of one year-month across all users (Admin report).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthlyTopSpender {
    pub month: String,
    pub username: String,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentMethodUsage {
    pub payment_method: String,
    pub total: Money,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberSpending {
    pub username: String,
    pub total: Money,
}

impl Engine {
    /// The caller's `n` largest expenses within the inclusive date range,
    /// amount descending. Ties keep insertion order.
    pub async fn top_expenses(
        &self,
        session: &Session,
        n: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultLedger<Vec<ExpenseRow>> {
        if start > end {
            return Err(LedgerError::Validation(
                "start date must not be after end date".to_string(),
            ));
        }
        let username = session.username.clone();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let models = expenses::Entity::find()
                    .filter(expenses::Column::UserId.eq(username))
                    .filter(expenses::Column::Date.gte(start))
                    .filter(expenses::Column::Date.lte(end))
                    .order_by_desc(expenses::Column::AmountMinor)
                    .order_by_asc(expenses::Column::Id)
                    .limit(n)
                    .all(db_tx)
                    .await?;
                engine.hydrate_expenses(db_tx, models).await
            })
        })
        .await
    }

    /// Total the caller spent in one category. `None` means no matching
    /// expenses at all, which is distinct from a zero total.
    pub async fn category_spending(
        &self,
        session: &Session,
        category: &str,
    ) -> ResultLedger<Option<Money>> {
        let username = session.username.clone();
        let category = category.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let category = engine.resolve_category(db_tx, &category).await?;
                let row = query_one(
                        db_tx,
                        "SELECT COALESCE(SUM(amount_minor), 0) AS total, COUNT(*) AS cnt \
                         FROM expenses WHERE user_id = ? AND category_id = ?",
                        vec![username.into(), category.id.into()],
                    )
                    .await?;
                let Some(row) = row else { return Ok(None) };
                let count: i64 = row.try_get("", "cnt")?;
                if count == 0 {
                    return Ok(None);
                }
                let total: i64 = row.try_get("", "total")?;
                Ok(Some(Money::new(total)))
            })
        })
        .await
    }

    /// The caller's expenses whose amount is strictly above the mean of
    /// their category, where the mean is taken over all users' expenses.
    pub async fn above_average_expenses(
        &self,
        session: &Session,
    ) -> ResultLedger<Vec<ExpenseRow>> {
        let username = session.username.clone();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let backend = db_tx.get_database_backend();
                let models = expenses::Entity::find()
                    .from_raw_sql(Statement::from_sql_and_values(
                        backend,
                        "SELECT e.* FROM expenses AS e \
                         JOIN (SELECT category_id, AVG(amount_minor) AS avg_minor \
                               FROM expenses GROUP BY category_id) AS a \
                           ON a.category_id = e.category_id \
                         WHERE e.user_id = ? AND e.amount_minor > a.avg_minor \
                         ORDER BY e.date DESC, e.id DESC",
                        vec![username.into()],
                    ))
                    .all(db_tx)
                    .await?;
                engine.hydrate_expenses(db_tx, models).await
            })
        })
        .await
    }

    /// Sum and count of the caller's expenses per (year-month, category),
    /// month descending then total descending.
    pub async fn monthly_category_spending(
        &self,
        session: &Session,
    ) -> ResultLedger<Vec<MonthlyCategorySpending>> {
        let username = session.username.clone();
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = query_all(
                        db_tx,
                        "SELECT strftime('%Y-%m', e.date) AS month, c.name AS category, \
                                SUM(e.amount_minor) AS total, COUNT(*) AS cnt \
                         FROM expenses AS e \
                         JOIN categories AS c ON c.id = e.category_id \
                         WHERE e.user_id = ? \
                         GROUP BY month, c.name \
                         ORDER BY month DESC, total DESC",
                        vec![username.into()],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(MonthlyCategorySpending {
                            month: row.try_get("", "month")?,
                            category: row.try_get("", "category")?,
                            total: Money::new(row.try_get("", "total")?),
                            count: row.try_get("", "cnt")?,
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    /// Admin-only: the user with the highest total per year-month across
    /// the whole ledger. Ties break to the lexicographically first
    /// username, so the output is deterministic.
    pub async fn highest_spender_per_month(
        &self,
        session: &Session,
    ) -> ResultLedger<Vec<MonthlyTopSpender>> {
        self.require_admin(session)?;
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = query_all(
                        db_tx,
                        "SELECT strftime('%Y-%m', date) AS month, user_id, \
                                SUM(amount_minor) AS total \
                         FROM expenses \
                         GROUP BY month, user_id \
                         ORDER BY month DESC, total DESC, user_id ASC",
                        Vec::new(),
                    )
                    .await?;
                let mut out: Vec<MonthlyTopSpender> = Vec::new();
                for row in rows {
                    let month: String = row.try_get("", "month")?;
                    if out.last().is_some_and(|prev| prev.month == month) {
                        continue;
                    }
                    out.push(MonthlyTopSpender {
                        month,
                        username: row.try_get("", "user_id")?,
                        total: Money::new(row.try_get("", "total")?),
                    });
                }
                Ok(out)
            })
        })
        .await
    }

    /// Every category tied at the caller's maximum expense count. Empty
    /// when the caller has no expenses.
    pub async fn frequent_categories(
        &self,
        session: &Session,
    ) -> ResultLedger<Vec<CategoryCount>> {
        let username = session.username.clone();
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = query_all(
                        db_tx,
                        "SELECT c.name AS category, COUNT(*) AS cnt \
                         FROM expenses AS e \
                         JOIN categories AS c ON c.id = e.category_id \
                         WHERE e.user_id = ? \
                         GROUP BY c.name \
                         ORDER BY cnt DESC, c.name ASC",
                        vec![username.into()],
                    )
                    .await?;
                let mut out: Vec<CategoryCount> = Vec::new();
                for row in rows {
                    let count: i64 = row.try_get("", "cnt")?;
                    if out.first().is_some_and(|top| count < top.count) {
                        break;
                    }
                    out.push(CategoryCount {
                        category: row.try_get("", "category")?,
                        count,
                    });
                }
                Ok(out)
            })
        })
        .await
    }

    /// Sum and count of the caller's expenses per payment method, total
    /// descending.
    pub async fn payment_method_usage(
        &self,
        session: &Session,
    ) -> ResultLedger<Vec<PaymentMethodUsage>> {
        let username = session.username.clone();
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = query_all(
                        db_tx,
                        "SELECT p.name AS payment_method, SUM(e.amount_minor) AS total, \
                                COUNT(*) AS cnt \
                         FROM expenses AS e \
                         JOIN payment_methods AS p ON p.id = e.payment_method_id \
                         WHERE e.user_id = ? \
                         GROUP BY p.name \
                         ORDER BY total DESC, p.name ASC",
                        vec![username.into()],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(PaymentMethodUsage {
                            payment_method: row.try_get("", "payment_method")?,
                            total: Money::new(row.try_get("", "total")?),
                            count: row.try_get("", "cnt")?,
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    /// Expense count per tag over the caller's ledger. Tags never used by
    /// the caller do not appear.
    pub async fn tag_expense_counts(&self, session: &Session) -> ResultLedger<Vec<TagCount>> {
        let username = session.username.clone();
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = query_all(
                        db_tx,
                        "SELECT t.name AS tag, COUNT(*) AS cnt \
                         FROM expense_tags AS et \
                         JOIN tags AS t ON t.id = et.tag_id \
                         JOIN expenses AS e ON e.id = et.expense_id \
                         WHERE e.user_id = ? \
                         GROUP BY t.name \
                         ORDER BY cnt DESC, t.name ASC",
                        vec![username.into()],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(TagCount {
                            tag: row.try_get("", "tag")?,
                            count: row.try_get("", "cnt")?,
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    /// Total one group spent in one category. Requires group permission;
    /// `None` means no matching group expenses.
    pub async fn group_category_spending(
        &self,
        session: &Session,
        group_name: &str,
        category: &str,
    ) -> ResultLedger<Option<Money>> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        let category = category.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;
                let category = engine.resolve_category(db_tx, &category).await?;
                let row = query_one(
                        db_tx,
                        "SELECT COALESCE(SUM(amount_minor), 0) AS total, COUNT(*) AS cnt \
                         FROM group_expenses WHERE group_id = ? AND category_id = ?",
                        vec![group.id.into(), category.id.into()],
                    )
                    .await?;
                let Some(row) = row else { return Ok(None) };
                let count: i64 = row.try_get("", "cnt")?;
                if count == 0 {
                    return Ok(None);
                }
                let total: i64 = row.try_get("", "total")?;
                Ok(Some(Money::new(total)))
            })
        })
        .await
    }

    /// Group-expense count per tag within one group.
    pub async fn group_tag_usage(
        &self,
        session: &Session,
        group_name: &str,
    ) -> ResultLedger<Vec<TagCount>> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;
                let rows = query_all(
                        db_tx,
                        "SELECT t.name AS tag, COUNT(*) AS cnt \
                         FROM group_expense_tags AS gt \
                         JOIN tags AS t ON t.id = gt.tag_id \
                         JOIN group_expenses AS ge ON ge.id = gt.group_expense_id \
                         WHERE ge.group_id = ? \
                         GROUP BY t.name \
                         ORDER BY cnt DESC, t.name ASC",
                        vec![group.id.into()],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(TagCount {
                            tag: row.try_get("", "tag")?,
                            count: row.try_get("", "cnt")?,
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    /// Per-member totals of one group's split shares, highest first.
    pub async fn group_member_spending(
        &self,
        session: &Session,
        group_name: &str,
    ) -> ResultLedger<Vec<MemberSpending>> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;
                let rows = query_all(
                        db_tx,
                        "SELECT s.user_id AS username, SUM(s.share_minor) AS total \
                         FROM split_shares AS s \
                         JOIN group_expenses AS ge ON ge.id = s.group_expense_id \
                         WHERE ge.group_id = ? \
                         GROUP BY s.user_id \
                         ORDER BY total DESC, s.user_id ASC",
                        vec![group.id.into()],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        Ok(MemberSpending {
                            username: row.try_get("", "username")?,
                            total: Money::new(row.try_get("", "total")?),
                        })
                    })
                    .collect()
            })
        })
        .await
    }
}

async fn query_one(
    db: &DatabaseTransaction,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> ResultLedger<Option<sea_orm::QueryResult>> {
    let backend = db.get_database_backend();
    db.query_one(Statement::from_sql_and_values(backend, sql, values))
        .await
        .map_err(Into::into)
}

async fn query_all(
    db: &DatabaseTransaction,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> ResultLedger<Vec<sea_orm::QueryResult>> {
    let backend = db.get_database_backend();
    db.query_all(Statement::from_sql_and_values(backend, sql, values))
        .await
        .map_err(Into::into)
}
