use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use tokio::{task::JoinSet, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    job_queue::{in_flight_count, insert_job},
    jobs::scheduled_job::ScheduledJob,
};

/// What the scheduler did for one cron tick
#[derive(Debug, PartialEq, Eq)]
pub enum TickResult {
    Enqueued,
    /// A previous run of the same job is still pending or running
    SkippedInFlight(u64),
}

/// Runs one timer loop per scheduled job until all of them stop.
pub async fn run(db: DatabaseConnection, schedule: Vec<ScheduledJob>) {
    info!("📅 Scheduler started with {} scheduled jobs", schedule.len());

    if schedule.is_empty() {
        debug!("📅 No scheduled jobs configured, scheduler will idle");
        std::future::pending::<()>().await;
    }

    let mut tasks = JoinSet::new();
    for scheduled_job in schedule {
        let db = db.clone();
        tasks.spawn(async move { run_scheduled_job(scheduled_job, db).await });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("📅 Scheduler task failed: {}", e);
        }
    }
}

async fn run_scheduled_job(scheduled_job: ScheduledJob, db: DatabaseConnection) {
    // Expressions are validated at boot; a failure here only disables this entry
    let schedule = match scheduled_job.schedule() {
        Ok(schedule) => schedule,
        Err(e) => {
            error!("❌ {}", e);
            return;
        }
    };

    debug!(
        "📅 '{}' scheduled with '{}'",
        scheduled_job.name, scheduled_job.cron_expression
    );

    loop {
        let Some(next_execution) = schedule.upcoming(Utc).next() else {
            error!(
                "❌ Could not determine next execution time for '{}'",
                scheduled_job.name
            );
            sleep(Duration::from_secs(60)).await;
            continue;
        };

        debug!(
            "🔄 '{}' next execution at: {}",
            scheduled_job.name,
            next_execution.format("%Y-%m-%d %H:%M:%S UTC")
        );

        sleep_until(next_execution).await;

        match enqueue_tick(&scheduled_job, next_execution, &db).await {
            Ok(TickResult::Enqueued) => {
                debug!("📅 Enqueued scheduled job '{}'", scheduled_job.name);
            }
            Ok(TickResult::SkippedInFlight(count)) => {
                warn!(
                    "⏭️ Skipping tick for '{}': {} run(s) still in flight",
                    scheduled_job.name, count
                );
            }
            Err(e) => {
                error!(
                    "❌ Failed to enqueue scheduled job '{}': {}",
                    scheduled_job.name, e
                );
            }
        }
    }
}

async fn sleep_until(at: DateTime<Utc>) {
    let duration = (at - Utc::now()).to_std().unwrap_or_default();
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

/// Enqueues the run for `tick` unless the previous run has not finished yet.
pub async fn enqueue_tick(
    scheduled_job: &ScheduledJob,
    tick: DateTime<Utc>,
    db: &DatabaseConnection,
) -> Result<TickResult, DbErr> {
    let in_flight = in_flight_count(db, scheduled_job.job_name).await?;
    if in_flight > 0 {
        return Ok(TickResult::SkippedInFlight(in_flight));
    }

    insert_job(db, scheduled_job.job_name, scheduled_job.arguments_at(tick)).await?;
    Ok(TickResult::Enqueued)
}

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    use chrono::TimeZone;

    use super::*;
    use crate::{
        database::models::{job, job_status::JobStatus},
        tests::setup_test::setup_test,
    };

    fn tick() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_tick_enqueues_when_idle() {
        let test = setup_test().await;
        let scheduled = ScheduledJob::new("document_expiry", "0 9 * * *");

        let result = enqueue_tick(&scheduled, tick(), &test.db).await.unwrap();

        assert_eq!(result, TickResult::Enqueued);
        let jobs = job::Entity::find().all(&test.db).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].r#type, "document_expiry");
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].arguments["as_of"], "2026-03-02T09:00:00+00:00");
    }

    #[tokio::test]
    async fn test_tick_is_skipped_while_previous_run_is_in_flight() {
        let test = setup_test().await;
        let scheduled = ScheduledJob::new("scheduled_messages", "* * * * *");

        let first = insert_job(&test.db, "scheduled_messages", serde_json::json!({}))
            .await
            .unwrap();
        let mut running: job::ActiveModel = first.into();
        running.status = Set(JobStatus::Running);
        running.update(&test.db).await.unwrap();

        let result = enqueue_tick(&scheduled, tick(), &test.db).await.unwrap();

        assert_eq!(result, TickResult::SkippedInFlight(1));
        assert_eq!(job::Entity::find().all(&test.db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finished_runs_do_not_block_the_next_tick() {
        let test = setup_test().await;
        let scheduled = ScheduledJob::new("scheduled_messages", "* * * * *");

        let first = insert_job(&test.db, "scheduled_messages", serde_json::json!({}))
            .await
            .unwrap();
        let mut finished: job::ActiveModel = first.into();
        finished.status = Set(JobStatus::Completed);
        finished.update(&test.db).await.unwrap();

        let result = enqueue_tick(&scheduled, tick(), &test.db).await.unwrap();

        assert_eq!(result, TickResult::Enqueued);
    }
}
