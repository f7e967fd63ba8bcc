use std::{future::Future, time::Duration};

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Lock keys for the singleton background loops
pub mod lock_keys {
    pub const SCHEDULER: i64 = 0x4E4F_5449_4653_4348; // "NOTIFSCH"
    pub const CLEANUP: i64 = 0x4E4F_5449_4643_4C4E; // "NOTIFCLN"
    pub const RECOVERY: i64 = 0x4E4F_5449_4652_4543; // "NOTIFREC"
}

const RESTART_DELAY: Duration = Duration::from_secs(10);

async fn advisory_lock_query(db: &DatabaseConnection, sql: &str, key: i64) -> Result<bool, DbErr> {
    let statement = Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, [key.into()]);

    Ok(db
        .query_one(statement)
        .await?
        .and_then(|row| row.try_get_by_index::<bool>(0).ok())
        .unwrap_or(false))
}

/// Runs `task_fn` so that only one instance in the deployment drives it.
///
/// On PostgreSQL the task runs while holding a session advisory lock; other
/// instances poll with jitter until the holder goes away. Other backends are
/// single-instance, so the task just runs. Either way the task is restarted
/// if it returns.
pub async fn run_exclusively<F, Fut>(
    db: DatabaseConnection,
    lock_key: i64,
    task_name: &str,
    task_fn: F,
) where
    F: Fn(DatabaseConnection) -> Fut,
    Fut: Future<Output = ()>,
{
    let guarded = db.get_database_backend() == DatabaseBackend::Postgres;
    let mut restart_count = 0_u32;

    loop {
        if guarded {
            match advisory_lock_query(&db, "SELECT pg_try_advisory_lock($1)", lock_key).await {
                Ok(true) => debug!("🔒 Acquired advisory lock for {}", task_name),
                Ok(false) => {
                    debug!("🔒 {} is driven by another instance, waiting", task_name);
                    sleep(Duration::from_secs(5) + Duration::from_millis(fastrand::u64(0..2000)))
                        .await;
                    continue;
                }
                Err(e) => {
                    error!("❌ Failed to acquire advisory lock for {}: {}", task_name, e);
                    sleep(RESTART_DELAY).await;
                    continue;
                }
            }
        }

        task_fn(db.clone()).await;

        if guarded {
            if let Err(e) =
                advisory_lock_query(&db, "SELECT pg_advisory_unlock($1)", lock_key).await
            {
                warn!("Failed to release advisory lock for {}: {}", task_name, e);
            }
        }

        restart_count += 1;
        error!(
            "💥 {} stopped (restart #{}) - restarting in {}s",
            task_name,
            restart_count,
            RESTART_DELAY.as_secs()
        );
        sleep(RESTART_DELAY).await;
    }
}
