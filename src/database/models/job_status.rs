use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a queued job row.
///
/// - `Pending` → `Running` → `Completed`
/// - `Pending` → `Running` → `PendingRetry` → `Running` → ...
/// - any attempt may end in `Failed` once retries are exhausted or the job
///   fails permanently
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    DeriveActiveEnum,
    EnumIter,
    Serialize,
    Deserialize,
    ::strum::Display,
    ::strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pending_retry")]
    PendingRetry,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl JobStatus {
    /// States in which a job still counts as in flight.
    pub const IN_FLIGHT: [Self; 3] = [Self::Pending, Self::PendingRetry, Self::Running];

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
