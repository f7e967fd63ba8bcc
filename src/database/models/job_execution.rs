//! `SeaORM` entity recording every attempt of a job

use sea_orm::entity::prelude::*;

use crate::database::models::job_result::ExecutionOutcome;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job_execution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub outcome: ExecutionOutcome,
    pub started_at: DateTime,
    pub finished_at: DateTime,
    pub execution_time_ms: i64,
    pub failure_reason: Option<String>,
    /// Report returned by the job, when it completed
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub report: Option<Json>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
