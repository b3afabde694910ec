//! Group ledger and splitter: groups, membership, shared expenses and the
//! per-member split.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};

use crate::{
    LedgerError, Money, ResultLedger, Session, group_expense_tags, group_expenses,
    group_memberships, groups, split_shares, tags,
};

use super::{Engine, ExpenseFilter, map_unique_violation, normalize_optional_text};

/// A group ledger row with names, tags and the persisted split attached.
/// `splits` pairs are `(username, share)` in no particular order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupExpenseRow {
    pub id: i32,
    pub group: String,
    pub created_by: String,
    pub amount: Money,
    pub category: String,
    pub payment_method: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub splits: Vec<(String, Money)>,
}

/// Equal division in minor units. The remainder of `amount / n` goes to the
/// first participant, so the shares always sum back to the amount exactly.
fn equal_split(amount_minor: i64, participants: usize) -> Vec<i64> {
    let n = participants as i64;
    let base = amount_minor / n;
    let mut shares = vec![base; participants];
    shares[0] += amount_minor - base * n;
    shares
}

impl Engine {
    /// Creates a group; the creator becomes its first member.
    pub async fn create_group(
        &self,
        session: &Session,
        name: &str,
        description: Option<&str>,
    ) -> ResultLedger<i32> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::Validation(
                "group name must not be empty".to_string(),
            ));
        }
        let username = session.username.clone();
        let description = normalize_optional_text(description);
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let inserted = groups::ActiveModel {
                    name: ActiveValue::Set(name.clone()),
                    description: ActiveValue::Set(description),
                    created_on: ActiveValue::Set(Utc::now().date_naive()),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| map_unique_violation(err, &name))?;

                group_memberships::ActiveModel {
                    group_id: ActiveValue::Set(inserted.id),
                    user_id: ActiveValue::Set(username),
                }
                .insert(db_tx)
                .await?;

                Ok(inserted.id)
            })
        })
        .await
    }

    /// Adds a user to a group.
    ///
    /// An empty group accepts anyone (bootstrap); once it has members, only
    /// a current member (or Admin under the override policy) may add more.
    pub async fn add_user_to_group(
        &self,
        session: &Session,
        username: &str,
        group_name: &str,
    ) -> ResultLedger<()> {
        let caller = session.clone();
        let username = username.to_string();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                let members = group_memberships::Entity::find()
                    .filter(group_memberships::Column::GroupId.eq(group.id))
                    .count(db_tx)
                    .await?;
                if members > 0 {
                    engine.require_group_access(db_tx, &group, &caller).await?;
                }
                engine.require_user_exists(db_tx, &username).await?;

                group_memberships::ActiveModel {
                    group_id: ActiveValue::Set(group.id),
                    user_id: ActiveValue::Set(username.clone()),
                }
                .insert(db_tx)
                .await
                .map_err(|err| map_unique_violation(err, &username))?;
                Ok(())
            })
        })
        .await
    }

    /// Deletes a group and everything it owns, in dependency order: split
    /// shares, expense tag links, group expenses, memberships, the group.
    pub async fn delete_group(&self, session: &Session, group_name: &str) -> ResultLedger<()> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;

                let expense_ids: Vec<i32> = group_expenses::Entity::find()
                    .select_only()
                    .column(group_expenses::Column::Id)
                    .filter(group_expenses::Column::GroupId.eq(group.id))
                    .into_tuple()
                    .all(db_tx)
                    .await?;
                if !expense_ids.is_empty() {
                    split_shares::Entity::delete_many()
                        .filter(
                            split_shares::Column::GroupExpenseId.is_in(expense_ids.clone()),
                        )
                        .exec(db_tx)
                        .await?;
                    group_expense_tags::Entity::delete_many()
                        .filter(
                            group_expense_tags::Column::GroupExpenseId
                                .is_in(expense_ids.clone()),
                        )
                        .exec(db_tx)
                        .await?;
                    group_expenses::Entity::delete_many()
                        .filter(group_expenses::Column::Id.is_in(expense_ids))
                        .exec(db_tx)
                        .await?;
                }
                group_memberships::Entity::delete_many()
                    .filter(group_memberships::Column::GroupId.eq(group.id))
                    .exec(db_tx)
                    .await?;
                groups::Entity::delete_by_id(group.id).exec(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Whether the caller may act on the group: member, or Admin under the
    /// override policy.
    pub async fn check_group_permission(
        &self,
        session: &Session,
        group_name: &str,
    ) -> ResultLedger<bool> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                Ok(engine
                    .require_group_access(db_tx, &group, &caller)
                    .await
                    .is_ok())
            })
        })
        .await
    }

    /// Current member usernames, ordered. Requires group permission.
    pub async fn group_members(
        &self,
        session: &Session,
        group_name: &str,
    ) -> ResultLedger<Vec<String>> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;
                let members = group_memberships::Entity::find()
                    .filter(group_memberships::Column::GroupId.eq(group.id))
                    .order_by_asc(group_memberships::Column::UserId)
                    .all(db_tx)
                    .await?;
                Ok(members.into_iter().map(|m| m.user_id).collect())
            })
        })
        .await
    }

    /// Records a shared expense and persists its split.
    ///
    /// Strict participant validation: every named split user must exist and
    /// be a current member of the group, or the whole call fails and
    /// nothing is committed. The creator is always a participant, named or
    /// not, and at least two distinct participants are required. Shares are
    /// an equal division with the remainder on the first participant.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_group_expense(
        &self,
        session: &Session,
        amount: Money,
        group_name: &str,
        category: &str,
        payment_method: &str,
        date: NaiveDate,
        description: Option<&str>,
        tags: &[String],
        split_usernames: &[String],
    ) -> ResultLedger<i32> {
        if !amount.is_positive() {
            return Err(LedgerError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }
        let caller = session.clone();
        let group_name = group_name.to_string();
        let category = category.to_string();
        let payment_method = payment_method.to_string();
        let description = normalize_optional_text(description);
        let tags = tags.to_vec();
        let split_usernames = split_usernames.to_vec();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;

                let category = engine.resolve_category(db_tx, &category).await?;
                let payment_method =
                    engine.resolve_payment_method(db_tx, &payment_method).await?;

                // Participant list: named order preserved, creator appended
                // when not named, duplicates dropped.
                let mut participants: Vec<String> = Vec::new();
                for name in split_usernames
                    .iter()
                    .map(|s| s.trim().to_string())
                    .chain(std::iter::once(caller.username.clone()))
                {
                    if !name.is_empty() && !participants.contains(&name) {
                        participants.push(name);
                    }
                }

                for participant in &participants {
                    engine.require_user_exists(db_tx, participant).await?;
                    if !engine.is_group_member(db_tx, group.id, participant).await? {
                        return Err(LedgerError::Consistency(format!(
                            "{participant} is not a member of group {}",
                            group.name
                        )));
                    }
                }
                if participants.len() < 2 {
                    return Err(LedgerError::Consistency(
                        "a group expense needs at least two participants".to_string(),
                    ));
                }

                let inserted = group_expenses::ActiveModel {
                    group_id: ActiveValue::Set(group.id),
                    created_by: ActiveValue::Set(caller.username.clone()),
                    amount_minor: ActiveValue::Set(amount.minor()),
                    category_id: ActiveValue::Set(category.id),
                    payment_method_id: ActiveValue::Set(payment_method.id),
                    date: ActiveValue::Set(date),
                    description: ActiveValue::Set(description),
                    ..Default::default()
                }
                .insert(db_tx)
                .await?;

                let tag_ids = engine.resolve_or_create_tags(db_tx, &tags).await?;
                for tag_id in tag_ids {
                    group_expense_tags::ActiveModel {
                        group_expense_id: ActiveValue::Set(inserted.id),
                        tag_id: ActiveValue::Set(tag_id),
                    }
                    .insert(db_tx)
                    .await?;
                }

                let shares = equal_split(amount.minor(), participants.len());
                if shares.iter().sum::<i64>() != amount.minor() {
                    return Err(LedgerError::Consistency(
                        "split shares do not reconcile with the amount".to_string(),
                    ));
                }
                for (participant, share) in participants.iter().zip(shares) {
                    split_shares::ActiveModel {
                        group_expense_id: ActiveValue::Set(inserted.id),
                        user_id: ActiveValue::Set(participant.clone()),
                        share_minor: ActiveValue::Set(share),
                    }
                    .insert(db_tx)
                    .await?;
                }

                Ok(inserted.id)
            })
        })
        .await
    }

    /// Lists a group's expenses, newest date first, with the same filter
    /// vocabulary as the personal ledger. Requires group permission.
    pub async fn list_group_expenses(
        &self,
        session: &Session,
        group_name: &str,
        filters: &[ExpenseFilter],
    ) -> ResultLedger<Vec<GroupExpenseRow>> {
        let caller = session.clone();
        let group_name = group_name.to_string();
        let filters = filters.to_vec();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine.require_group_by_name(db_tx, &group_name).await?;
                engine.require_group_access(db_tx, &group, &caller).await?;

                let mut query = group_expenses::Entity::find()
                    .filter(group_expenses::Column::GroupId.eq(group.id))
                    .order_by_desc(group_expenses::Column::Date)
                    .order_by_desc(group_expenses::Column::Id);

                for filter in &filters {
                    query = match filter {
                        ExpenseFilter::Category(name) => {
                            let category = engine.resolve_category(db_tx, name).await?;
                            query.filter(group_expenses::Column::CategoryId.eq(category.id))
                        }
                        ExpenseFilter::PaymentMethod(name) => {
                            let method = engine.resolve_payment_method(db_tx, name).await?;
                            query.filter(
                                group_expenses::Column::PaymentMethodId.eq(method.id),
                            )
                        }
                        ExpenseFilter::MinAmount(min) => {
                            query.filter(group_expenses::Column::AmountMinor.gte(min.minor()))
                        }
                        ExpenseFilter::MaxAmount(max) => {
                            query.filter(group_expenses::Column::AmountMinor.lte(max.minor()))
                        }
                        ExpenseFilter::Date(date) => {
                            query.filter(group_expenses::Column::Date.eq(*date))
                        }
                        ExpenseFilter::Tag(name) => {
                            let Some(tag) = engine.find_tag(db_tx, name).await? else {
                                return Ok(Vec::new());
                            };
                            let tagged: Vec<i32> = group_expense_tags::Entity::find()
                                .select_only()
                                .column(group_expense_tags::Column::GroupExpenseId)
                                .filter(group_expense_tags::Column::TagId.eq(tag.id))
                                .into_tuple()
                                .all(db_tx)
                                .await?;
                            if tagged.is_empty() {
                                return Ok(Vec::new());
                            }
                            query.filter(group_expenses::Column::Id.is_in(tagged))
                        }
                    };
                }

                let models = query.all(db_tx).await?;
                engine.hydrate_group_expenses(db_tx, &group, models).await
            })
        })
        .await
    }

    pub(super) async fn hydrate_group_expenses(
        &self,
        db: &DatabaseTransaction,
        group: &groups::Model,
        models: Vec<group_expenses::Model>,
    ) -> ResultLedger<Vec<GroupExpenseRow>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let category_names: HashMap<i32, String> = crate::categories::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let method_names: HashMap<i32, String> = crate::payment_methods::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect();
        let tag_names: HashMap<i32, String> = tags::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let links = group_expense_tags::Entity::find()
            .filter(group_expense_tags::Column::GroupExpenseId.is_in(ids.clone()))
            .all(db)
            .await?;
        let mut tags_by_expense: HashMap<i32, Vec<String>> = HashMap::new();
        for link in links {
            if let Some(name) = tag_names.get(&link.tag_id) {
                tags_by_expense
                    .entry(link.group_expense_id)
                    .or_default()
                    .push(name.clone());
            }
        }

        let share_rows = split_shares::Entity::find()
            .filter(split_shares::Column::GroupExpenseId.is_in(ids))
            .order_by_asc(split_shares::Column::UserId)
            .all(db)
            .await?;
        let mut splits_by_expense: HashMap<i32, Vec<(String, Money)>> = HashMap::new();
        for share in share_rows {
            splits_by_expense
                .entry(share.group_expense_id)
                .or_default()
                .push((share.user_id, Money::new(share.share_minor)));
        }

        let mut rows = Vec::with_capacity(models.len());
        for model in models {
            let mut row_tags = tags_by_expense.remove(&model.id).unwrap_or_default();
            row_tags.sort();
            rows.push(GroupExpenseRow {
                id: model.id,
                group: group.name.clone(),
                created_by: model.created_by,
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
                splits: splits_by_expense.remove(&model.id).unwrap_or_default(),
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::equal_split;

    #[test]
    fn equal_split_divides_evenly() {
        assert_eq!(equal_split(9000, 3), vec![3000, 3000, 3000]);
    }

    #[test]
    fn equal_split_gives_remainder_to_first() {
        assert_eq!(equal_split(1000, 3), vec![334, 333, 333]);
        assert_eq!(equal_split(1001, 2), vec![501, 500]);
    }

    #[test]
    fn equal_split_always_reconciles() {
        for amount in [1, 7, 99, 1000, 12345] {
            for n in 2..=6 {
                assert_eq!(equal_split(amount, n).iter().sum::<i64>(), amount);
            }
        }
    }
}
