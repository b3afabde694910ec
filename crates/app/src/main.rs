use migration::{Migrator, MigratorTrait};

mod settings;
mod shell;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "spendbook={level},engine={level}",
            level = settings.log_level
        ))
        .init();

    let database = sea_orm::Database::connect(settings.database_url()).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready at {}", settings.database_url());

    let engine = engine::Engine::builder()
        .database(database)
        .admin_group_override(settings.admin_group_override)
        .build();

    shell::run(engine).await
}
