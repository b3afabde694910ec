//! Seeds the bootstrap Admin account. Every other user is created through
//! the engine by an Admin, so a fresh database needs this one to get going.

use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = db.get_database_backend();
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password, role) \
             SELECT ?, ?, ? \
             WHERE NOT EXISTS (SELECT 1 FROM users WHERE username = ?);",
            [
                "admin".into(),
                "admin".into(),
                "Admin".into(),
                "admin".into(),
            ],
        ))
        .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = db.get_database_backend();
        db.execute(Statement::from_sql_and_values(
            backend,
            "DELETE FROM users WHERE username = ?;",
            ["admin".into()],
        ))
        .await?;
        Ok(())
    }
}
