use std::{cmp, error::Error, process};

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use crate::{
    cli::MigrateAction,
    config::Config,
    database::{connect, migrations::Migrator},
};

pub async fn handle_migrate_command(config: &Config, action: MigrateAction) {
    let db = match connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ Could not connect to the database: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_migration_action(&db, action).await {
        eprintln!("❌ Migration failed: {e}");
        process::exit(1);
    }
}

pub async fn run_migration_action(
    db: &DatabaseConnection,
    action: MigrateAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        MigrateAction::Up { steps } => {
            let pending = Migrator::get_pending_migrations(db).await?;

            if pending.is_empty() {
                println!("✅ All migrations are already up to date");
                return Ok(());
            }

            let count = steps.map_or(pending.len(), |steps| {
                cmp::min(steps as usize, pending.len())
            });
            println!("Running {count} migration(s) up:");
            for migration in &pending[..count] {
                println!("  📄 {}", migration.name());
            }
            println!();

            Migrator::up(db, steps).await?;
            println!("✅ Migrations completed successfully");
        }
        MigrateAction::Down { steps } => {
            let applied = Migrator::get_applied_migrations(db).await?;

            if applied.is_empty() {
                println!("❌ No migrations to roll back");
                return Ok(());
            }

            let count = cmp::min(steps as usize, applied.len());
            println!("Rolling back {count} migration(s):");
            for migration in applied[applied.len() - count..].iter().rev() {
                println!("  📄 {}", migration.name());
            }
            println!();

            Migrator::down(db, Some(steps)).await?;
            println!("✅ Rollback completed successfully");
        }
        MigrateAction::Status => {
            let pending = Migrator::get_pending_migrations(db).await?;
            if pending.is_empty() {
                println!("✅ All migrations are up to date");
            } else {
                println!("📋 Pending migrations:");
                for migration in pending {
                    println!("  - {}", migration.name());
                }
            }

            println!("📋 Applied migrations:");
            for migration in Migrator::get_applied_migrations(db).await? {
                println!("  ✓ {}", migration.name());
            }
        }
        MigrateAction::Fresh => {
            println!("🔄 Dropping all tables and re-running migrations (this will drop all data!)...");
            Migrator::fresh(db).await?;
            println!("✅ Database rebuilt");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    #[tokio::test]
    async fn test_up_then_down_leaves_pending_migrations() {
        let db = connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            pool_size: 1,
        })
        .await
        .unwrap();

        run_migration_action(&db, MigrateAction::Up { steps: None }).await.unwrap();
        assert!(Migrator::get_pending_migrations(&db).await.unwrap().is_empty());

        run_migration_action(&db, MigrateAction::Down { steps: 1 }).await.unwrap();
        assert_eq!(Migrator::get_pending_migrations(&db).await.unwrap().len(), 1);
    }
}
