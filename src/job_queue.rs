use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use crate::database::models::{job, job_status::JobStatus};

/// Queues a run of `job_name` for the worker pools.
pub async fn insert_job(
    db: &impl ConnectionTrait,
    job_name: &str,
    arguments: serde_json::Value,
) -> Result<job::Model, DbErr> {
    let now = chrono::Utc::now().naive_utc();

    job::ActiveModel {
        id: Set(Uuid::new_v4()),
        created_at: Set(now),
        updated_at: Set(now),
        r#type: Set(job_name.to_string()),
        arguments: Set(arguments),
        status: Set(JobStatus::Pending),
        retry_count: Set(0),
        next_execution_at: Set(None),
    }
    .insert(db)
    .await
}

/// Counts runs of `job_name` that are queued, waiting for a retry or executing.
pub async fn in_flight_count(db: &impl ConnectionTrait, job_name: &str) -> Result<u64, DbErr> {
    job::Entity::find()
        .filter(job::Column::Type.eq(job_name))
        .filter(job::Column::Status.is_in(JobStatus::IN_FLIGHT))
        .count(db)
        .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tests::setup_test::setup_test;

    #[tokio::test]
    async fn test_finished_runs_are_not_in_flight() {
        let test = setup_test().await;
        let done = insert_job(&test.db, "document_expiry", json!({})).await.unwrap();
        insert_job(&test.db, "document_expiry", json!({})).await.unwrap();
        insert_job(&test.db, "spotlight_rotation", json!({})).await.unwrap();

        let mut done: job::ActiveModel = done.into();
        done.status = Set(JobStatus::Completed);
        done.update(&test.db).await.unwrap();

        assert_eq!(in_flight_count(&test.db, "document_expiry").await.unwrap(), 1);
        assert_eq!(in_flight_count(&test.db, "consultation_reminders").await.unwrap(), 0);
    }
}
