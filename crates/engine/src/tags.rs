//! Tag registry. Unlike categories, any authenticated user may create tags,
//! and they can also be created implicitly while recording an expense.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_tags::Entity")]
    ExpenseTags,
    #[sea_orm(has_many = "super::group_expense_tags::Entity")]
    GroupExpenseTags,
}

impl ActiveModelBehavior for ActiveModel {}
