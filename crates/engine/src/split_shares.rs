//! Per-member shares of a group expense.
//!
//! Invariant: the shares of one group expense sum to its `amount_minor`
//! exactly; the write path attributes the division remainder to the first
//! participant.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "split_shares")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_expense_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub share_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group_expenses::Entity",
        from = "Column::GroupExpenseId",
        to = "super::group_expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    GroupExpenses,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::group_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupExpenses.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
