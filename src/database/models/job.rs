//! `SeaORM` entity for queued job runs

use sea_orm::entity::prelude::*;

use crate::database::models::job_status::JobStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub r#type: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub arguments: Json,
    pub status: JobStatus,
    pub retry_count: i32,
    pub next_execution_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_execution::Entity")]
    JobExecution,
}

impl Related<super::job_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobExecution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
