use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{config::DatabaseConfig, database::migrations::Migrator};

pub mod migrations;
pub mod models;

/// Connects and runs pending migrations in the background.
///
/// The receiver resolves once migrations have finished, so the caller can
/// keep a liveness endpoint up while a slow migration runs.
pub async fn setup_database(
    db_config: &DatabaseConfig,
) -> Result<(DatabaseConnection, oneshot::Receiver<Result<(), DbErr>>), DbErr> {
    let connection = connect(db_config).await?;
    let migrations_connection = connection.clone();

    let (sender, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let migration_result = Migrator::up(&migrations_connection, None).await;
        let _ = sender.send(migration_result);
    });

    Ok((connection, receiver))
}

pub async fn connect(db_config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(db_config.url.clone());

    options.sqlx_logging(false);
    options.max_connections(db_config.pool_size);

    // Every connection to `sqlite::memory:` opens a separate database
    if db_config.url.starts_with("sqlite::memory:") {
        options.max_connections(1).min_connections(1);
    }

    debug!("Connecting to database at: {}", &db_config.url);

    sea_orm::Database::connect(options).await
}
