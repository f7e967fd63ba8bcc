use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use sea_orm::{
    sea_query::{LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sqlx::postgres::PgListener;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    app::App,
    config::WorkerPoolConfig,
    database::models::{job, job_execution, job_status::JobStatus},
    jobs::{job_registry::JobRegistry, outcome::JobOutcome},
};

const FALLBACK_POLL_INTERVAL_SECS: u64 = 30;
const NEW_JOB_CHANNEL: &str = "job_new";
const MAX_RETRY_DELAY_SECS: i64 = 30 * 24 * 3600;

async fn connect_listener(worker_name: &str, app: &App) -> Option<PgListener> {
    if app.db.get_database_backend() != DatabaseBackend::Postgres {
        return None;
    }

    let pool = app.db.get_postgres_connection_pool();
    match PgListener::connect_with(pool).await {
        Ok(mut listener) => match listener.listen(NEW_JOB_CHANNEL).await {
            Ok(()) => {
                debug!("Worker '{}' listening on '{}'", worker_name, NEW_JOB_CHANNEL);
                Some(listener)
            }
            Err(e) => {
                warn!(
                    "Worker '{}' failed to LISTEN on '{}': {}. Polling instead.",
                    worker_name, NEW_JOB_CHANNEL, e
                );
                None
            }
        },
        Err(e) => {
            warn!(
                "Worker '{}' failed to create PgListener: {}. Polling instead.",
                worker_name, e
            );
            None
        }
    }
}

/// Claims and runs jobs for one pool until a database error stops it.
pub async fn worker(
    worker_name: &str,
    pool_config: &WorkerPoolConfig,
    app: App,
    job_registry: &JobRegistry,
) -> Result<(), DbErr> {
    let mut listener = connect_listener(worker_name, &app).await;

    loop {
        let mut processed = 0_usize;
        while process_next_job(worker_name, pool_config, &app, job_registry).await? {
            processed += 1;
        }
        if processed > 0 {
            debug!("Worker '{}' drained {} job(s)", worker_name, processed);
        }

        let Some(active) = listener.as_mut() else {
            sleep(Duration::from_secs(1)).await;
            continue;
        };

        match timeout(Duration::from_secs(FALLBACK_POLL_INTERVAL_SECS), active.recv()).await {
            Ok(Ok(_)) => debug!("Worker '{}' woken by notification", worker_name),
            Ok(Err(e)) => {
                error!(
                    "Worker '{}' PgListener error: {}. Switching to polling.",
                    worker_name, e
                );
                listener = None;
            }
            Err(_) => debug!(
                "Worker '{}' polling after {}s without notifications",
                worker_name, FALLBACK_POLL_INTERVAL_SECS
            ),
        }
    }
}

/// Runs the oldest runnable job of the pool, if there is one.
///
/// Returns whether a job was processed.
pub async fn process_next_job(
    worker_name: &str,
    pool_config: &WorkerPoolConfig,
    app: &App,
    job_registry: &JobRegistry,
) -> Result<bool, DbErr> {
    let Some(job_model) = claim_next_job(pool_config, &app.db).await? else {
        return Ok(false);
    };

    debug!(
        "🔧 Worker '{}' claimed {}({})",
        worker_name, job_model.r#type, job_model.id
    );

    let started = Instant::now();
    let started_at = chrono::Utc::now().naive_utc();
    let job_timeout = Duration::from_secs(u64::from(pool_config.job_timeout));

    let outcome = timeout(
        job_timeout,
        job_registry.execute(app, &job_model.r#type, &job_model.arguments),
    )
    .await
    .unwrap_or(JobOutcome::TimedOut);

    record_outcome(
        &job_model,
        &outcome,
        started_at,
        started.elapsed(),
        pool_config,
        &app.db,
        worker_name,
    )
    .await?;

    Ok(true)
}

async fn claim_next_job(
    pool_config: &WorkerPoolConfig,
    db: &DatabaseConnection,
) -> Result<Option<job::Model>, DbErr> {
    let txn = db.begin().await?;
    let now = chrono::Utc::now().naive_utc();

    let candidate = job::Entity::find()
        .filter(job::Column::Type.is_in(pool_config.jobs.iter().map(String::as_str)))
        .filter(job::Column::Status.is_in([JobStatus::Pending, JobStatus::PendingRetry]))
        .filter(
            job::Column::NextExecutionAt
                .is_null()
                .or(job::Column::NextExecutionAt.lte(now)),
        )
        .order_by_asc(job::Column::CreatedAt)
        .limit(1)
        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
        .one(&txn)
        .await?;

    let Some(job_model) = candidate else {
        txn.commit().await?;
        return Ok(None);
    };

    let mut running: job::ActiveModel = job_model.into();
    running.status = Set(JobStatus::Running);
    running.updated_at = Set(now);
    let claimed = running.update(&txn).await?;

    txn.commit().await?;
    Ok(Some(claimed))
}

async fn record_outcome(
    job_model: &job::Model,
    outcome: &JobOutcome,
    started_at: NaiveDateTime,
    elapsed: Duration,
    pool_config: &WorkerPoolConfig,
    db: &DatabaseConnection,
    worker_name: &str,
) -> Result<(), DbErr> {
    let now = chrono::Utc::now().naive_utc();
    let execution_time_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);

    job_execution::ActiveModel {
        id: Set(Uuid::new_v4()),
        job_id: Set(job_model.id),
        outcome: Set(outcome.execution_outcome()),
        started_at: Set(started_at),
        finished_at: Set(now),
        execution_time_ms: Set(execution_time_ms),
        failure_reason: Set(outcome.failure_reason()),
        report: Set(match outcome {
            JobOutcome::Completed(report) => Some(report.clone()),
            _ => None,
        }),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    let mut active_job: job::ActiveModel = job_model.clone().into();
    active_job.updated_at = Set(now);

    if let JobOutcome::Completed(report) = outcome {
        info!(
            "✅ Worker '{}' completed {}({}) in {:?}: {}",
            worker_name, job_model.r#type, job_model.id, elapsed, report
        );
        active_job.status = Set(JobStatus::Completed);
    } else if outcome.is_retryable() && job_model.retry_count < pool_config.max_retries {
        let next_execution_at = now + retry_delay(job_model.retry_count, pool_config);
        warn!(
            "⚠️ Worker '{}' will retry {}({}) at {} after {}",
            worker_name, job_model.r#type, job_model.id, next_execution_at, outcome
        );
        active_job.status = Set(JobStatus::PendingRetry);
        active_job.retry_count = Set(job_model.retry_count + 1);
        active_job.next_execution_at = Set(Some(next_execution_at));
    } else {
        error!(
            "❌ Worker '{}' failed {}({}) after {} attempt(s): {}",
            worker_name,
            job_model.r#type,
            job_model.id,
            job_model.retry_count + 1,
            outcome
        );
        active_job.status = Set(JobStatus::from(outcome));
    }

    active_job.update(db).await?;
    Ok(())
}

/// `base * multiplier^retry_count`, capped at `MAX_RETRY_DELAY_SECS`.
fn retry_delay(retry_count: i32, pool_config: &WorkerPoolConfig) -> chrono::Duration {
    let exponent = u32::try_from(retry_count).unwrap_or(0);
    let seconds = pool_config.base_retry_delay_seconds.saturating_mul(
        pool_config
            .retry_backoff_multiplier
            .saturating_pow(exponent),
    );

    chrono::Duration::seconds(
        i64::try_from(seconds)
            .unwrap_or(MAX_RETRY_DELAY_SECS)
            .min(MAX_RETRY_DELAY_SECS),
    )
}

#[cfg(test)]
mod tests {
    use sea_orm::EntityTrait;
    use serde_json::json;

    use super::*;
    use crate::{
        database::models::job_result::ExecutionOutcome,
        job_queue::insert_job,
        jobs::{Job, JobError},
        tests::setup_test::setup_test,
    };

    struct CountsThings;

    impl Job for CountsThings {
        type Arguments = serde_json::Value;
        type Report = serde_json::Value;

        async fn execute(
            _app: &App,
            _arguments: Self::Arguments,
        ) -> Result<Self::Report, JobError> {
            Ok(json!({ "created": 2 }))
        }

        fn name() -> &'static str {
            "counts_things"
        }
    }

    struct Flaky;

    impl Job for Flaky {
        type Arguments = serde_json::Value;
        type Report = ();

        async fn execute(_app: &App, _arguments: Self::Arguments) -> Result<(), JobError> {
            Err(JobError::TryAgainLater("store unavailable".to_string()))
        }

        fn name() -> &'static str {
            "flaky"
        }
    }

    struct Broken;

    impl Job for Broken {
        type Arguments = serde_json::Value;
        type Report = ();

        async fn execute(_app: &App, _arguments: Self::Arguments) -> Result<(), JobError> {
            Err(JobError::FailPermanently("bad arguments".to_string()))
        }

        fn name() -> &'static str {
            "broken"
        }
    }

    fn pool(jobs: &[&str]) -> WorkerPoolConfig {
        WorkerPoolConfig {
            jobs: jobs.iter().map(ToString::to_string).collect(),
            count: 1,
            job_timeout: 5,
            max_retries: 1,
            base_retry_delay_seconds: 30,
            retry_backoff_multiplier: 4,
        }
    }

    fn registry() -> JobRegistry {
        JobRegistry::new()
            .with_job::<CountsThings>()
            .with_job::<Flaky>()
            .with_job::<Broken>()
    }

    #[tokio::test]
    async fn test_completed_job_stores_its_report() {
        let test = setup_test().await;
        let created = insert_job(&test.db, "counts_things", json!({})).await.unwrap();

        let processed =
            process_next_job("test-0", &pool(&["counts_things"]), &test.app, &registry())
                .await
                .unwrap();

        assert!(processed);
        let job = job::Entity::find_by_id(created.id).one(&test.db).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let executions = job_execution::Entity::find().all(&test.db).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].outcome, ExecutionOutcome::Completed);
        assert_eq!(executions[0].report, Some(json!({ "created": 2 })));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_then_fails() {
        let test = setup_test().await;
        let created = insert_job(&test.db, "flaky", json!({})).await.unwrap();
        let config = pool(&["flaky"]);

        process_next_job("test-0", &config, &test.app, &registry()).await.unwrap();

        let job = job::Entity::find_by_id(created.id).one(&test.db).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::PendingRetry);
        assert_eq!(job.retry_count, 1);
        assert!(job.next_execution_at.unwrap() > chrono::Utc::now().naive_utc());

        // Not runnable until the backoff elapses
        let processed = process_next_job("test-0", &config, &test.app, &registry()).await.unwrap();
        assert!(!processed);

        let mut due: job::ActiveModel = job.into();
        due.next_execution_at = Set(Some(chrono::Utc::now().naive_utc()));
        due.update(&test.db).await.unwrap();

        process_next_job("test-0", &config, &test.app, &registry()).await.unwrap();

        let job = job::Entity::find_by_id(created.id).one(&test.db).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job_execution::Entity::find().all(&test.db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let test = setup_test().await;
        let created = insert_job(&test.db, "broken", json!({})).await.unwrap();

        process_next_job("test-0", &pool(&["broken"]), &test.app, &registry())
            .await
            .unwrap();

        let job = job::Entity::find_by_id(created.id).one(&test.db).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);

        let execution = job_execution::Entity::find().one(&test.db).await.unwrap().unwrap();
        assert_eq!(execution.failure_reason.as_deref(), Some("bad arguments"));
    }

    #[tokio::test]
    async fn test_pool_ignores_jobs_it_does_not_serve() {
        let test = setup_test().await;
        insert_job(&test.db, "broken", json!({})).await.unwrap();

        let processed =
            process_next_job("test-0", &pool(&["counts_things"]), &test.app, &registry())
                .await
                .unwrap();

        assert!(!processed);
    }

    #[test]
    fn test_retry_delay_grows_exponentially() {
        let config = pool(&[]);

        assert_eq!(retry_delay(0, &config), chrono::Duration::seconds(30));
        assert_eq!(retry_delay(1, &config), chrono::Duration::seconds(120));
        assert_eq!(retry_delay(2, &config), chrono::Duration::seconds(480));
    }
}
