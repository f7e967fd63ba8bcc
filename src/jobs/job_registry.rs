use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use crate::app::App;

use super::{outcome::JobOutcome, Job, JobError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type JobExecutor = Arc<
    dyn Fn(&App, serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, JobError>>
        + Send
        + Sync,
>;

/// Maps job names to type-erased executors.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, JobExecutor>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_job<J: Job + 'static>(mut self) -> Self {
        self.register_job::<J>();
        self
    }

    pub fn register_job<J: Job + 'static>(&mut self) {
        self.jobs.insert(
            J::name(),
            Arc::new(|app: &App, args_json: serde_json::Value| {
                let app = app.clone();
                let future: BoxFuture<'static, Result<serde_json::Value, JobError>> =
                    Box::pin(async move {
                        let arguments: J::Arguments =
                            serde_json::from_value(args_json).map_err(|e| {
                                JobError::FailPermanently(format!(
                                    "Failed to parse job arguments: {e}"
                                ))
                            })?;
                        let report = J::execute(&app, arguments).await?;
                        serde_json::to_value(report).map_err(|e| {
                            JobError::FailPermanently(format!(
                                "Failed to serialize job report: {e}"
                            ))
                        })
                    });
                future
            }),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Registered job names, sorted
    pub fn job_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.jobs.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn execute(
        &self,
        app: &App,
        name: &str,
        arguments: &serde_json::Value,
    ) -> JobOutcome {
        let Some(executor) = self.jobs.get(name) else {
            return JobOutcome::Failed(JobError::FailPermanently(format!(
                "No job registered for job type: {name}"
            )));
        };

        match executor(app, arguments.clone()).await {
            Ok(report) => JobOutcome::Completed(report),
            Err(e) => JobOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{notifiers::job_registry, tests::setup_test::setup_test};

    #[tokio::test]
    async fn test_unknown_job_fails_permanently() {
        let test = setup_test().await;

        let outcome = job_registry()
            .execute(&test.app, "send_newsletter", &json!({}))
            .await;

        assert!(matches!(outcome, JobOutcome::Failed(JobError::FailPermanently(_))));
        assert!(!outcome.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_not_retried() {
        let test = setup_test().await;

        let outcome = job_registry()
            .execute(&test.app, "document_expiry", &json!({ "as_of": "yesterday" }))
            .await;

        assert!(matches!(outcome, JobOutcome::Failed(JobError::FailPermanently(_))));
    }

    #[tokio::test]
    async fn test_report_is_returned_as_json() {
        let test = setup_test().await;

        let outcome = job_registry()
            .execute(&test.app, "scheduled_messages", &json!({}))
            .await;

        let JobOutcome::Completed(report) = outcome else {
            panic!("expected completed outcome, got {outcome}");
        };
        assert_eq!(report["due"], 0);
        assert_eq!(report["sent"], 0);
    }

    #[test]
    fn test_job_names_are_sorted() {
        assert_eq!(
            job_registry().job_names(),
            vec![
                "consultation_reminders",
                "document_expiry",
                "scheduled_messages",
                "spotlight_rotation"
            ]
        );
    }
}
