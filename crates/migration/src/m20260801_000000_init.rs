//! Initial schema migration - creates all tables from scratch.
//!
//! The complete schema in one consolidated migration:
//!
//! - `users`: authentication and role
//! - `categories`, `payment_methods`, `tags`: shared taxonomy, unique names
//! - `expenses` + `expense_tags`: the personal ledger
//! - `groups` + `group_memberships`: shared ledgers and who belongs to them
//! - `group_expenses` + `group_expense_tags` + `split_shares`: shared
//!   expenses and the per-member division of each

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
    Role,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum PaymentMethods {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    UserId,
    AmountMinor,
    CategoryId,
    PaymentMethodId,
    Date,
    Description,
}

#[derive(Iden)]
enum ExpenseTags {
    Table,
    ExpenseId,
    TagId,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
    Description,
    CreatedOn,
}

#[derive(Iden)]
enum GroupMemberships {
    Table,
    GroupId,
    UserId,
}

#[derive(Iden)]
enum GroupExpenses {
    Table,
    Id,
    GroupId,
    CreatedBy,
    AmountMinor,
    CategoryId,
    PaymentMethodId,
    Date,
    Description,
}

#[derive(Iden)]
enum GroupExpenseTags {
    Table,
    GroupExpenseId,
    TagId,
}

#[derive(Iden)]
enum SplitShares {
    Table,
    GroupExpenseId,
    UserId,
    ShareMinor,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Taxonomy: categories, payment methods, tags
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-name-unique")
                    .table(Categories::Table)
                    .col(Categories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentMethods::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentMethods::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentMethods::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payment_methods-name-unique")
                    .table(PaymentMethods::Table)
                    .col(PaymentMethods::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tags::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tags::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-tags-name-unique")
                    .table(Tags::Table)
                    .col(Tags::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Personal ledger
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::CategoryId).integer().not_null())
                    .col(
                        ColumnDef::new(Expenses::PaymentMethodId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::Date).date().not_null())
                    .col(ColumnDef::new(Expenses::Description).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-user_id")
                            .from(Expenses::Table, Expenses::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-category_id")
                            .from(Expenses::Table, Expenses::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-payment_method_id")
                            .from(Expenses::Table, Expenses::PaymentMethodId)
                            .to(PaymentMethods::Table, PaymentMethods::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-user_id-date")
                    .table(Expenses::Table)
                    .col(Expenses::UserId)
                    .col(Expenses::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExpenseTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExpenseTags::ExpenseId).integer().not_null())
                    .col(ColumnDef::new(ExpenseTags::TagId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(ExpenseTags::ExpenseId)
                            .col(ExpenseTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_tags-expense_id")
                            .from(ExpenseTags::Table, ExpenseTags::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_tags-tag_id")
                            .from(ExpenseTags::Table, ExpenseTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Groups and membership
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Groups::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::Description).string())
                    .col(ColumnDef::new(Groups::CreatedOn).date().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-groups-name-unique")
                    .table(Groups::Table)
                    .col(Groups::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMemberships::GroupId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupMemberships::UserId)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(GroupMemberships::GroupId)
                            .col(GroupMemberships::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_memberships-group_id")
                            .from(GroupMemberships::Table, GroupMemberships::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_memberships-user_id")
                            .from(GroupMemberships::Table, GroupMemberships::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Group ledger and splits
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(GroupExpenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupExpenses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupExpenses::GroupId).integer().not_null())
                    .col(
                        ColumnDef::new(GroupExpenses::CreatedBy)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupExpenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupExpenses::CategoryId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupExpenses::PaymentMethodId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupExpenses::Date).date().not_null())
                    .col(ColumnDef::new(GroupExpenses::Description).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_expenses-group_id")
                            .from(GroupExpenses::Table, GroupExpenses::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_expenses-created_by")
                            .from(GroupExpenses::Table, GroupExpenses::CreatedBy)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_expenses-category_id")
                            .from(GroupExpenses::Table, GroupExpenses::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_expenses-payment_method_id")
                            .from(GroupExpenses::Table, GroupExpenses::PaymentMethodId)
                            .to(PaymentMethods::Table, PaymentMethods::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_expenses-group_id-date")
                    .table(GroupExpenses::Table)
                    .col(GroupExpenses::GroupId)
                    .col(GroupExpenses::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupExpenseTags::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupExpenseTags::GroupExpenseId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupExpenseTags::TagId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(GroupExpenseTags::GroupExpenseId)
                            .col(GroupExpenseTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_expense_tags-group_expense_id")
                            .from(
                                GroupExpenseTags::Table,
                                GroupExpenseTags::GroupExpenseId,
                            )
                            .to(GroupExpenses::Table, GroupExpenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_expense_tags-tag_id")
                            .from(GroupExpenseTags::Table, GroupExpenseTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SplitShares::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SplitShares::GroupExpenseId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SplitShares::UserId).string().not_null())
                    .col(
                        ColumnDef::new(SplitShares::ShareMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(SplitShares::GroupExpenseId)
                            .col(SplitShares::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-split_shares-group_expense_id")
                            .from(SplitShares::Table, SplitShares::GroupExpenseId)
                            .to(GroupExpenses::Table, GroupExpenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-split_shares-user_id")
                            .from(SplitShares::Table, SplitShares::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SplitShares::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupExpenseTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupExpenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
