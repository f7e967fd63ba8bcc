use sea_orm::DatabaseBackend;
use sea_orm_migration::{
    prelude::*,
    schema::{
        big_integer, integer, json_binary, json_binary_null, string, string_len, string_null,
        timestamp, timestamp_null, uuid,
    },
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Job::Table)
                    .if_not_exists()
                    .col(uuid(Job::Id).primary_key())
                    .col(timestamp(Job::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp(Job::UpdatedAt).default(Expr::current_timestamp()))
                    .col(string(Job::Type))
                    .col(json_binary(Job::Arguments))
                    .col(string_len(Job::Status, 16).default("pending"))
                    .col(integer(Job::RetryCount).default(0))
                    .col(timestamp_null(Job::NextExecutionAt))
                    .to_owned(),
            )
            .await?;

        // Workers claim by (type, status) and the scheduler checks in-flight runs the same way
        manager
            .create_index(
                Index::create()
                    .name("idx-job-type-status")
                    .table(Job::Table)
                    .col(Job::Type)
                    .col(Job::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(JobExecution::Table)
                    .if_not_exists()
                    .col(uuid(JobExecution::Id).primary_key())
                    .col(uuid(JobExecution::JobId))
                    .col(string_len(JobExecution::Outcome, 16))
                    .col(timestamp(JobExecution::StartedAt))
                    .col(timestamp(JobExecution::FinishedAt))
                    .col(big_integer(JobExecution::ExecutionTimeMs))
                    .col(string_null(JobExecution::FailureReason))
                    .col(json_binary_null(JobExecution::Report))
                    .col(timestamp(JobExecution::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-job_execution-job_id")
                            .from(JobExecution::Table, JobExecution::JobId)
                            .to(Job::Table, Job::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-job_execution-job_id")
                    .table(JobExecution::Table)
                    .col(JobExecution::JobId)
                    .to_owned(),
            )
            .await?;

        // Idle workers LISTEN on this channel; other backends poll
        if manager.get_database_backend() == DatabaseBackend::Postgres {
            let connection = manager.get_connection();
            connection
                .execute_unprepared(
                    r"
                    CREATE OR REPLACE FUNCTION notify_job_new()
                    RETURNS TRIGGER AS $$
                    BEGIN
                        PERFORM pg_notify('job_new', NEW.type);
                        RETURN NEW;
                    END;
                    $$ LANGUAGE plpgsql;
                    ",
                )
                .await?;
            connection
                .execute_unprepared(
                    r"
                    CREATE TRIGGER job_new_notify
                        AFTER INSERT ON job
                        FOR EACH ROW
                        EXECUTE FUNCTION notify_job_new();
                    ",
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() == DatabaseBackend::Postgres {
            let connection = manager.get_connection();
            connection
                .execute_unprepared("DROP TRIGGER IF EXISTS job_new_notify ON job")
                .await?;
            connection
                .execute_unprepared("DROP FUNCTION IF EXISTS notify_job_new()")
                .await?;
        }

        manager
            .drop_table(Table::drop().table(JobExecution::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    Type,
    Arguments,
    Status,
    RetryCount,
    NextExecutionAt,
}

#[derive(DeriveIden)]
enum JobExecution {
    Table,
    Id,
    JobId,
    Outcome,
    StartedAt,
    FinishedAt,
    ExecutionTimeMs,
    FailureReason,
    Report,
    CreatedAt,
}
