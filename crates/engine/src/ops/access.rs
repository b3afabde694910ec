//! Authorization checks and name resolution shared by the operation modules.

use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, prelude::*};

use crate::{
    LedgerError, ResultLedger, Session, categories, group_memberships, groups, payment_methods,
    tags, users,
};

use super::{Engine, map_unique_violation, normalize_name};

impl Engine {
    /// Privileged operations re-check the role on the session at call time.
    pub(super) fn require_admin(&self, session: &Session) -> ResultLedger<()> {
        if !session.is_admin() {
            return Err(LedgerError::Forbidden("requires Admin role".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultLedger<users::Model> {
        users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {username}")))
    }

    /// Group names are identifiers: matched exactly, not case-folded.
    pub(super) async fn require_group_by_name(
        &self,
        db: &DatabaseTransaction,
        group_name: &str,
    ) -> ResultLedger<groups::Model> {
        let name = group_name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation(
                "group name must not be empty".to_string(),
            ));
        }
        groups::Entity::find()
            .filter(groups::Column::Name.eq(name))
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("group {group_name}")))
    }

    pub(super) async fn is_group_member(
        &self,
        db: &DatabaseTransaction,
        group_id: i32,
        username: &str,
    ) -> ResultLedger<bool> {
        let row = group_memberships::Entity::find_by_id((group_id, username.to_string()))
            .one(db)
            .await?;
        Ok(row.is_some())
    }

    /// Group-scoped authorization: members always pass; an Admin passes only
    /// when the engine-wide override policy is on.
    pub(super) async fn require_group_access(
        &self,
        db: &DatabaseTransaction,
        group: &groups::Model,
        session: &Session,
    ) -> ResultLedger<()> {
        if self.admin_group_override && session.is_admin() {
            return Ok(());
        }
        if self.is_group_member(db, group.id, &session.username).await? {
            return Ok(());
        }
        Err(LedgerError::Forbidden(format!(
            "not a member of group {}",
            group.name
        )))
    }

    pub(super) async fn resolve_category(
        &self,
        db: &DatabaseTransaction,
        name: &str,
    ) -> ResultLedger<categories::Model> {
        let normalized = normalize_name(name, "category")?;
        categories::Entity::find()
            .filter(categories::Column::Name.eq(normalized))
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("category {name}")))
    }

    pub(super) async fn resolve_payment_method(
        &self,
        db: &DatabaseTransaction,
        name: &str,
    ) -> ResultLedger<payment_methods::Model> {
        let normalized = normalize_name(name, "payment method")?;
        payment_methods::Entity::find()
            .filter(payment_methods::Column::Name.eq(normalized))
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("payment method {name}")))
    }

    pub(super) async fn find_tag(
        &self,
        db: &DatabaseTransaction,
        name: &str,
    ) -> ResultLedger<Option<tags::Model>> {
        let normalized = normalize_name(name, "tag")?;
        tags::Entity::find()
            .filter(tags::Column::Name.eq(normalized))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Resolves tag names to ids, creating missing tags on the fly. This is
    /// the implicit creation path used while recording expenses; it skips
    /// the explicit `add_tag` entry point on purpose.
    pub(super) async fn resolve_or_create_tags(
        &self,
        db: &DatabaseTransaction,
        names: &[String],
    ) -> ResultLedger<Vec<i32>> {
        let mut ids = Vec::with_capacity(names.len());
        for raw in names {
            let name = normalize_name(raw, "tag")?;
            let existing = tags::Entity::find()
                .filter(tags::Column::Name.eq(name.clone()))
                .one(db)
                .await?;
            let id = match existing {
                Some(tag) => tag.id,
                None => {
                    let inserted = tags::ActiveModel {
                        name: ActiveValue::Set(name.clone()),
                        ..Default::default()
                    }
                    .insert(db)
                    .await
                    .map_err(|err| map_unique_violation(err, &name))?;
                    inserted.id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
