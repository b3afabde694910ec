//! Group-expense/tag association rows.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "group_expense_tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_expense_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub tag_id: i32,
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
        belongs_to = "super::tags::Entity",
        from = "Column::TagId",
        to = "super::tags::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Tags,
}

impl Related<super::group_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupExpenses.def()
    }
}

impl Related<super::tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
