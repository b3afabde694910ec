//! Expense-sharing groups. The membership roster lives in
//! `group_memberships`; the creator always joins on creation.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_on: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_memberships::Entity")]
    GroupMemberships,
    #[sea_orm(has_many = "super::group_expenses::Entity")]
    GroupExpenses,
}

impl Related<super::group_memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupMemberships.def()
    }
}

impl Related<super::group_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupExpenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
