//! Identity operations: login and Admin-only user management.

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{
    LedgerError, ResultLedger, Role, Session, expense_tags, expenses, group_expenses,
    group_memberships, split_shares, users,
};

use super::{Engine, map_unique_violation};

/// User fields an Admin may update. Closed set: the field name is parsed
/// into this enum at the boundary, never spliced into a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserField {
    Password,
    Role,
}

impl TryFrom<&str> for UserField {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "password" | "secret" => Ok(Self::Password),
            "role" => Ok(Self::Role),
            other => Err(LedgerError::Validation(format!(
                "invalid user field: {other}"
            ))),
        }
    }
}

impl Engine {
    /// Verifies credentials and returns the caller's [`Session`].
    ///
    /// Unknown user and wrong password are the same failure; nothing about
    /// which check failed is leaked.
    pub async fn login(&self, username: &str, password: &str) -> ResultLedger<Session> {
        let username = username.to_string();
        let password = password.to_string();
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let denied = || LedgerError::Forbidden("invalid credentials".to_string());
                let user = users::Entity::find_by_id(username.clone())
                    .one(db_tx)
                    .await?
                    .ok_or_else(denied)?;
                if user.password != password {
                    return Err(denied());
                }
                Ok(Session {
                    username: user.username,
                    role: Role::try_from(user.role.as_str())?,
                })
            })
        })
        .await
    }

    /// Creates a user (Admin-only). Duplicate usernames are reported from
    /// the primary-key violation.
    pub async fn add_user(
        &self,
        session: &Session,
        username: &str,
        password: &str,
        role: Role,
    ) -> ResultLedger<()> {
        self.require_admin(session)?;
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(LedgerError::Validation(
                "username must not be empty".to_string(),
            ));
        }
        let password = password.to_string();
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                users::ActiveModel {
                    username: ActiveValue::Set(username.clone()),
                    password: ActiveValue::Set(password),
                    role: ActiveValue::Set(role.as_str().to_string()),
                }
                .insert(db_tx)
                .await
                .map_err(|err| map_unique_violation(err, &username))?;
                Ok(())
            })
        })
        .await
    }

    /// Updates a user's password or role (Admin-only).
    pub async fn update_user(
        &self,
        session: &Session,
        username: &str,
        field: UserField,
        value: &str,
    ) -> ResultLedger<()> {
        self.require_admin(session)?;
        let username = username.to_string();
        let value = value.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_user_exists(db_tx, &username).await?;
                let mut active = users::ActiveModel {
                    username: ActiveValue::Set(username.clone()),
                    ..Default::default()
                };
                match field {
                    UserField::Password => {
                        if value.is_empty() {
                            return Err(LedgerError::Validation(
                                "password must not be empty".to_string(),
                            ));
                        }
                        active.password = ActiveValue::Set(value);
                    }
                    UserField::Role => {
                        let role = Role::try_from(value.as_str())?;
                        active.role = ActiveValue::Set(role.as_str().to_string());
                    }
                }
                active.update(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Deletes a user (Admin-only).
    ///
    /// Personal expenses and group memberships go with the user. Deletion
    /// is refused while group financial history still references the user:
    /// split shares and group expenses keep their debtors.
    pub async fn delete_user(&self, session: &Session, username: &str) -> ResultLedger<()> {
        self.require_admin(session)?;
        let username = username.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_user_exists(db_tx, &username).await?;

                let in_splits = split_shares::Entity::find()
                    .filter(split_shares::Column::UserId.eq(username.clone()))
                    .count(db_tx)
                    .await?;
                let created_group_expenses = group_expenses::Entity::find()
                    .filter(group_expenses::Column::CreatedBy.eq(username.clone()))
                    .count(db_tx)
                    .await?;
                if in_splits > 0 || created_group_expenses > 0 {
                    return Err(LedgerError::Consistency(format!(
                        "user {username} is referenced by group expense history"
                    )));
                }

                let expense_ids: Vec<i32> = expenses::Entity::find()
                    .select_only()
                    .column(expenses::Column::Id)
                    .filter(expenses::Column::UserId.eq(username.clone()))
                    .into_tuple()
                    .all(db_tx)
                    .await?;
                if !expense_ids.is_empty() {
                    expense_tags::Entity::delete_many()
                        .filter(expense_tags::Column::ExpenseId.is_in(expense_ids.clone()))
                        .exec(db_tx)
                        .await?;
                    expenses::Entity::delete_many()
                        .filter(expenses::Column::Id.is_in(expense_ids))
                        .exec(db_tx)
                        .await?;
                }

                group_memberships::Entity::delete_many()
                    .filter(group_memberships::Column::UserId.eq(username.clone()))
                    .exec(db_tx)
                    .await?;
                users::Entity::delete_by_id(username.clone()).exec(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    /// Lists all users as `(username, role)` pairs (Admin-only).
    pub async fn list_users(&self, session: &Session) -> ResultLedger<Vec<(String, String)>> {
        self.require_admin(session)?;
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = users::Entity::find()
                    .order_by_asc(users::Column::Username)
                    .all(db_tx)
                    .await?;
                Ok(rows.into_iter().map(|u| (u.username, u.role)).collect())
            })
        })
        .await
    }
}
