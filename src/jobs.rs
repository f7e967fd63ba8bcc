mod advisory_lock;
pub mod job_registry;
pub mod outcome;
pub mod scheduled_job;
mod scheduler;
pub mod supervisor;
mod worker;

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::app::App;

#[derive(Debug, Error)]
pub enum JobError {
    /// Retrying cannot help, e.g. malformed arguments
    #[error("{0}")]
    FailPermanently(String),
    #[error("{0}")]
    TryAgainLater(String),
}

impl From<sea_orm::DbErr> for JobError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::TryAgainLater(format!("database error: {err}"))
    }
}

/// A unit of background work, enqueued by the scheduler or on demand.
///
/// `execute` returns a report that the worker stores with the execution
/// record and logs.
pub trait Job: Send + Sync {
    type Arguments: DeserializeOwned + Send + Sync;
    type Report: Serialize + Send;

    fn execute(
        app: &App,
        arguments: Self::Arguments,
    ) -> impl Future<Output = Result<Self::Report, JobError>> + Send;

    fn name() -> &'static str;
}
