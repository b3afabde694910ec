//! Taxonomy registry: categories, payment methods and tags.
//!
//! Category and payment-method creation is Admin-only; tags may be created
//! by any authenticated user. Categories and payment methods expose no
//! delete: expenses hold non-nullable references to them.

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*};

use crate::{
    LedgerError, ResultLedger, Session, categories, expense_tags, group_expense_tags,
    payment_methods, tags,
};

use super::{Engine, map_unique_violation, normalize_name};

impl Engine {
    /// Registers a category (Admin-only). Returns the new id.
    pub async fn add_category(&self, session: &Session, name: &str) -> ResultLedger<i32> {
        self.require_admin(session)?;
        let name = normalize_name(name, "category")?;
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let inserted = categories::ActiveModel {
                    name: ActiveValue::Set(name.clone()),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| map_unique_violation(err, &name))?;
                Ok(inserted.id)
            })
        })
        .await
    }

    /// Registers a payment method (Admin-only). Returns the new id.
    pub async fn add_payment_method(&self, session: &Session, name: &str) -> ResultLedger<i32> {
        self.require_admin(session)?;
        let name = normalize_name(name, "payment method")?;
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let inserted = payment_methods::ActiveModel {
                    name: ActiveValue::Set(name.clone()),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| map_unique_violation(err, &name))?;
                Ok(inserted.id)
            })
        })
        .await
    }

    /// Registers a tag. Any authenticated caller may do this.
    pub async fn add_tag(&self, _session: &Session, name: &str) -> ResultLedger<i32> {
        let name = normalize_name(name, "tag")?;
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let inserted = tags::ActiveModel {
                    name: ActiveValue::Set(name.clone()),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| map_unique_violation(err, &name))?;
                Ok(inserted.id)
            })
        })
        .await
    }

    /// Deletes a tag by name, pruning every expense and group-expense
    /// association first so no dangling links survive.
    pub async fn delete_tag(&self, _session: &Session, name: &str) -> ResultLedger<()> {
        let name = name.to_string();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let tag = engine
                    .find_tag(db_tx, &name)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(format!("tag {name}")))?;
                expense_tags::Entity::delete_many()
                    .filter(expense_tags::Column::TagId.eq(tag.id))
                    .exec(db_tx)
                    .await?;
                group_expense_tags::Entity::delete_many()
                    .filter(group_expense_tags::Column::TagId.eq(tag.id))
                    .exec(db_tx)
                    .await?;
                tags::Entity::delete_by_id(tag.id).exec(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn list_categories(&self, _session: &Session) -> ResultLedger<Vec<String>> {
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = categories::Entity::find()
                    .order_by_asc(categories::Column::Name)
                    .all(db_tx)
                    .await?;
                Ok(rows.into_iter().map(|c| c.name).collect())
            })
        })
        .await
    }

    pub async fn list_payment_methods(&self, _session: &Session) -> ResultLedger<Vec<String>> {
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = payment_methods::Entity::find()
                    .order_by_asc(payment_methods::Column::Name)
                    .all(db_tx)
                    .await?;
                Ok(rows.into_iter().map(|m| m.name).collect())
            })
        })
        .await
    }

    pub async fn list_tags(&self, _session: &Session) -> ResultLedger<Vec<String>> {
        self.with_tx(|_engine, db_tx| {
            Box::pin(async move {
                let rows = tags::Entity::find()
                    .order_by_asc(tags::Column::Name)
                    .all(db_tx)
                    .await?;
                Ok(rows.into_iter().map(|t| t.name).collect())
            })
        })
        .await
    }
}
