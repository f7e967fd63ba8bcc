use std::{collections::HashSet, time::Duration};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use thiserror::Error;
use tokio::{spawn, time::sleep};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    app::App,
    config::{CleanupConfig, JobsConfig, WorkerPoolConfig, WorkersConfig},
    database::models::{
        job, job_execution, job_result::ExecutionOutcome, job_status::JobStatus,
    },
    jobs::{
        advisory_lock::{lock_keys, run_exclusively},
        job_registry::JobRegistry,
        scheduled_job::{ScheduleError, ScheduledJob},
        scheduler, worker,
    },
};

const RECOVERY_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no worker pool is configured to run job '{0}'")]
    UncoveredJob(String),
    #[error("job '{0}' is scheduled but not registered")]
    UnknownScheduledJob(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Checks that every registered job has a pool and every schedule entry is
/// valid, so misconfiguration fails at boot instead of leaving jobs queued.
pub fn verify_configuration(
    workers_config: &WorkersConfig,
    job_registry: &JobRegistry,
    job_schedule: &[ScheduledJob],
) -> Result<(), SupervisorError> {
    let covered: HashSet<&str> = workers_config
        .pools
        .values()
        .flat_map(|pool| pool.jobs.iter().map(String::as_str))
        .collect();

    if let Some(uncovered) = job_registry
        .job_names()
        .into_iter()
        .find(|name| !covered.contains(name))
    {
        return Err(SupervisorError::UncoveredJob(uncovered.to_string()));
    }

    for scheduled_job in job_schedule {
        if !job_registry.contains(scheduled_job.job_name) {
            return Err(SupervisorError::UnknownScheduledJob(
                scheduled_job.job_name.to_string(),
            ));
        }
        scheduled_job.schedule()?;
    }

    Ok(())
}

/// Starts worker pools and the singleton loops, then runs forever.
pub async fn job_supervisor(
    jobs_config: JobsConfig,
    app: App,
    job_registry: JobRegistry,
    job_schedule: Vec<ScheduledJob>,
) {
    start_worker_pools(&jobs_config.workers, &app, &job_registry);
    start_scheduler(&app.db, job_schedule);
    start_recovery_task(&jobs_config.workers, &app.db);
    start_cleanup_task(&jobs_config.cleanup, &app.db);

    std::future::pending::<()>().await;
}

fn start_worker_pools(config: &WorkersConfig, app: &App, job_registry: &JobRegistry) {
    info!("🚀 Starting job workers");

    for (pool_name, pool_config) in &config.pools {
        info!(
            "⚡ Pool '{}': {} worker(s) for jobs {:?}",
            pool_name, pool_config.count, pool_config.jobs
        );

        for worker_id in 0..pool_config.count {
            let worker_name = format!("{pool_name}-{worker_id}");
            let pool_config = pool_config.clone();
            let app = app.clone();
            let job_registry = job_registry.clone();

            spawn(async move {
                run_worker_with_restart(&worker_name, &pool_config, app, &job_registry).await;
            });
        }
    }
}

async fn run_worker_with_restart(
    worker_name: &str,
    pool_config: &WorkerPoolConfig,
    app: App,
    job_registry: &JobRegistry,
) {
    let mut restart_count = 0_u32;
    loop {
        debug!(
            "Starting worker '{}' (restart #{})",
            worker_name, restart_count
        );

        if let Err(e) = worker::worker(worker_name, pool_config, app.clone(), job_registry).await {
            error!(
                "💥 Worker '{}' crashed (restart #{}): {}",
                worker_name, restart_count, e
            );
        }

        restart_count += 1;
        sleep(Duration::from_secs(10)).await;
    }
}

fn start_scheduler(db: &DatabaseConnection, job_schedule: Vec<ScheduledJob>) {
    let db = db.clone();
    spawn(async move {
        run_exclusively(db, lock_keys::SCHEDULER, "scheduler", move |db| {
            scheduler::run(db, job_schedule.clone())
        })
        .await;
    });
}

fn start_recovery_task(config: &WorkersConfig, db: &DatabaseConnection) {
    let config = config.clone();
    let db = db.clone();
    spawn(async move {
        run_exclusively(db, lock_keys::RECOVERY, "stuck job recovery", move |db| {
            let config = config.clone();
            async move { run_recovery_loop(&config, &db).await }
        })
        .await;
    });
}

fn start_cleanup_task(config: &CleanupConfig, db: &DatabaseConnection) {
    let config = config.clone();
    let db = db.clone();
    spawn(async move {
        run_exclusively(db, lock_keys::CLEANUP, "job cleanup", move |db| {
            let config = config.clone();
            async move { run_cleanup_loop(&config, &db).await }
        })
        .await;
    });
}

async fn run_recovery_loop(config: &WorkersConfig, db: &DatabaseConnection) {
    info!("🏥 Starting stuck job recovery");
    loop {
        match recover_stuck_jobs(config, db, chrono::Utc::now().naive_utc()).await {
            Ok(0) => {}
            Ok(recovered) => info!("🏥 Recovered {} stuck job(s)", recovered),
            Err(e) => {
                error!("❌ Failed to recover stuck jobs: {}", e);
                return;
            }
        }

        sleep(RECOVERY_INTERVAL).await;
    }
}

/// Puts back jobs that have been `running` for more than twice their
/// pool's timeout, e.g. because the instance running them died.
pub async fn recover_stuck_jobs(
    config: &WorkersConfig,
    db: &DatabaseConnection,
    now: chrono::NaiveDateTime,
) -> Result<usize, DbErr> {
    let mut recovered = 0;

    for (pool_name, pool_config) in &config.pools {
        let threshold_seconds = i64::from(pool_config.job_timeout) * 2;
        let cutoff = now - chrono::Duration::seconds(threshold_seconds);

        let stuck_jobs = job::Entity::find()
            .filter(job::Column::Status.eq(JobStatus::Running))
            .filter(job::Column::Type.is_in(pool_config.jobs.iter().map(String::as_str)))
            .filter(job::Column::UpdatedAt.lte(cutoff))
            .all(db)
            .await?;

        for stuck_job in stuck_jobs {
            let running_for = now.signed_duration_since(stuck_job.updated_at);
            warn!(
                "🏥 Recovering {}({}) in pool '{}', running for {}s (threshold {}s)",
                stuck_job.r#type,
                stuck_job.id,
                pool_name,
                running_for.num_seconds(),
                threshold_seconds
            );

            job_execution::ActiveModel {
                id: Set(Uuid::new_v4()),
                job_id: Set(stuck_job.id),
                outcome: Set(ExecutionOutcome::TimedOut),
                started_at: Set(stuck_job.updated_at),
                finished_at: Set(now),
                execution_time_ms: Set(running_for.num_milliseconds()),
                failure_reason: Set(Some(format!(
                    "Recovered after running for {}s",
                    running_for.num_seconds()
                ))),
                report: Set(None),
                created_at: Set(now),
            }
            .insert(db)
            .await?;

            let mut pending: job::ActiveModel = stuck_job.into();
            pending.status = Set(JobStatus::Pending);
            pending.updated_at = Set(now);
            pending.update(db).await?;

            recovered += 1;
        }
    }

    Ok(recovered)
}

async fn run_cleanup_loop(config: &CleanupConfig, db: &DatabaseConnection) {
    info!("🧹 Starting job cleanup task");
    loop {
        match cleanup_old_jobs(config, db, chrono::Utc::now().naive_utc()).await {
            Ok(0) => {}
            Ok(deleted) => debug!("🧹 Deleted {} old job(s)", deleted),
            Err(e) => error!("🧹 Failed to clean up old jobs: {}", e),
        }

        sleep(Duration::from_secs(config.interval_seconds)).await;
    }
}

/// Deletes finished jobs past their retention; executions cascade.
pub async fn cleanup_old_jobs(
    config: &CleanupConfig,
    db: &DatabaseConnection,
    now: chrono::NaiveDateTime,
) -> Result<usize, DbErr> {
    let cutoff = |seconds: u64| {
        i64::try_from(seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|retention| now.checked_sub_signed(retention))
            .unwrap_or(chrono::NaiveDateTime::MIN)
    };

    let completed = cleanup_jobs_with_status(
        db,
        JobStatus::Completed,
        cutoff(config.completed_retention_seconds),
        config.batch_size,
    )
    .await?;

    let failed = cleanup_jobs_with_status(
        db,
        JobStatus::Failed,
        cutoff(config.failed_retention_seconds),
        config.batch_size,
    )
    .await?;

    Ok(completed + failed)
}

async fn cleanup_jobs_with_status(
    db: &DatabaseConnection,
    status: JobStatus,
    cutoff: chrono::NaiveDateTime,
    batch_size: u64,
) -> Result<usize, DbErr> {
    let mut deleted = 0;

    loop {
        let job_ids: Vec<Uuid> = job::Entity::find()
            .select_only()
            .column(job::Column::Id)
            .filter(job::Column::Status.eq(status))
            .filter(job::Column::UpdatedAt.lte(cutoff))
            .order_by_asc(job::Column::CreatedAt)
            .limit(batch_size)
            .into_tuple()
            .all(db)
            .await?;

        if job_ids.is_empty() {
            return Ok(deleted);
        }

        let batch = job_ids.len();
        job::Entity::delete_many()
            .filter(job::Column::Id.is_in(job_ids))
            .exec(db)
            .await?;

        deleted += batch;
        if batch < usize::try_from(batch_size).unwrap_or(usize::MAX) {
            return Ok(deleted);
        }

        sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::{job_queue::insert_job, notifiers, tests::setup_test::setup_test};

    fn workers(jobs: &[&str]) -> WorkersConfig {
        WorkersConfig {
            pools: HashMap::from([(
                "default".to_string(),
                WorkerPoolConfig {
                    jobs: jobs.iter().map(ToString::to_string).collect(),
                    count: 1,
                    job_timeout: 60,
                    max_retries: 3,
                    base_retry_delay_seconds: 30,
                    retry_backoff_multiplier: 4,
                },
            )]),
        }
    }

    async fn set_status(
        db: &DatabaseConnection,
        model: job::Model,
        status: JobStatus,
        updated_at: chrono::NaiveDateTime,
    ) -> job::Model {
        let mut active: job::ActiveModel = model.into();
        active.status = Set(status);
        active.updated_at = Set(updated_at);
        active.update(db).await.unwrap()
    }

    #[test]
    fn test_uncovered_job_is_rejected() {
        let registry = notifiers::job_registry();

        let result = verify_configuration(&workers(&["document_expiry"]), &registry, &[]);

        assert!(matches!(result, Err(SupervisorError::UncoveredJob(_))));
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        let registry = notifiers::job_registry();
        let all_jobs = registry.job_names();
        let schedule = vec![ScheduledJob::new("document_expiry", "every morning")];

        let result = verify_configuration(&workers(&all_jobs), &registry, &schedule);

        assert!(matches!(result, Err(SupervisorError::Schedule(_))));
    }

    #[test]
    fn test_complete_configuration_is_accepted() {
        let registry = notifiers::job_registry();
        let all_jobs = registry.job_names();
        let schedule = vec![
            ScheduledJob::new("document_expiry", "0 9 * * *"),
            ScheduledJob::new("consultation_reminders", "*/15 * * * *"),
        ];

        assert!(verify_configuration(&workers(&all_jobs), &registry, &schedule).is_ok());
    }

    #[tokio::test]
    async fn test_stuck_jobs_are_put_back_in_the_queue() {
        let test = setup_test().await;
        let now = chrono::Utc::now().naive_utc();

        let stuck = insert_job(&test.db, "document_expiry", json!({})).await.unwrap();
        let stuck_since = now - chrono::Duration::seconds(121);
        let stuck = set_status(&test.db, stuck, JobStatus::Running, stuck_since).await;
        let busy = insert_job(&test.db, "document_expiry", json!({})).await.unwrap();
        let busy_since = now - chrono::Duration::seconds(30);
        let busy = set_status(&test.db, busy, JobStatus::Running, busy_since).await;

        let recovered = recover_stuck_jobs(&workers(&["document_expiry"]), &test.db, now)
            .await
            .unwrap();

        assert_eq!(recovered, 1);
        let stuck = job::Entity::find_by_id(stuck.id).one(&test.db).await.unwrap().unwrap();
        assert_eq!(stuck.status, JobStatus::Pending);
        let busy = job::Entity::find_by_id(busy.id).one(&test.db).await.unwrap().unwrap();
        assert_eq!(busy.status, JobStatus::Running);

        let execution = job_execution::Entity::find().one(&test.db).await.unwrap().unwrap();
        assert_eq!(execution.outcome, ExecutionOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_cleanup_respects_retention_per_status() {
        let test = setup_test().await;
        let now = chrono::Utc::now().naive_utc();
        let config = CleanupConfig {
            interval_seconds: 60,
            completed_retention_seconds: 3600,
            failed_retention_seconds: 86_400,
            batch_size: 10,
        };

        let two_hours_ago = now - chrono::Duration::hours(2);
        let old_completed = insert_job(&test.db, "spotlight_rotation", json!({})).await.unwrap();
        set_status(&test.db, old_completed, JobStatus::Completed, two_hours_ago).await;
        let recent_failed = insert_job(&test.db, "spotlight_rotation", json!({})).await.unwrap();
        let recent_failed =
            set_status(&test.db, recent_failed, JobStatus::Failed, two_hours_ago).await;
        let pending = insert_job(&test.db, "spotlight_rotation", json!({})).await.unwrap();

        let deleted = cleanup_old_jobs(&config, &test.db, now).await.unwrap();

        assert_eq!(deleted, 1);
        let remaining: Vec<Uuid> = job::Entity::find()
            .all(&test.db)
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&recent_failed.id));
        assert!(remaining.contains(&pending.id));
    }
}
