use std::fmt::{Display, Formatter, Result};

use crate::{
    database::models::{job_result::ExecutionOutcome, job_status::JobStatus},
    jobs::JobError,
};

/// What happened when a worker ran a job once.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(serde_json::Value),
    Failed(JobError),
    TimedOut,
}

impl JobOutcome {
    pub const fn execution_outcome(&self) -> ExecutionOutcome {
        match self {
            Self::Completed(_) => ExecutionOutcome::Completed,
            Self::Failed(_) => ExecutionOutcome::Failed,
            Self::TimedOut => ExecutionOutcome::TimedOut,
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(e) => Some(e.to_string()),
            Self::TimedOut => Some("Job execution timed out".to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Failed(JobError::TryAgainLater(_)) | Self::TimedOut
        )
    }
}

impl Display for JobOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Completed(report) => write!(f, "completed: {report}"),
            Self::Failed(e) => write!(f, "error: {e}"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

impl From<&JobOutcome> for JobStatus {
    fn from(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed(_) => Self::Completed,
            JobOutcome::Failed(_) | JobOutcome::TimedOut => Self::Failed,
        }
    }
}
