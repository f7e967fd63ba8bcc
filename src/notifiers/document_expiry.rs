use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    app::App,
    database::models::document,
    jobs::{Job, JobError},
    notifications::{self, kinds, Reminder},
    notifiers::announce,
};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentExpiryArguments {
    /// Evaluate as if the job ran at this instant
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct DocumentExpiryReport {
    pub scanned: usize,
    pub created: usize,
    pub duplicates: usize,
}

pub struct DocumentExpiryJob;

impl Job for DocumentExpiryJob {
    type Arguments = DocumentExpiryArguments;
    type Report = DocumentExpiryReport;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<Self::Report, JobError> {
        let now = arguments.as_of.unwrap_or_else(Utc::now).naive_utc();
        Ok(remind_expiring_documents(app, now).await?)
    }

    fn name() -> &'static str {
        "document_expiry"
    }
}

/// Whole days left, rounded up: anything under 24 hours counts as one day.
pub fn days_until_expiry(expires_at: NaiveDateTime, now: NaiveDateTime) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

pub fn idempotency_key(document_id: uuid::Uuid, days: i64) -> String {
    format!("document-expiry:{document_id}:{days}d")
}

pub async fn remind_expiring_documents(
    app: &App,
    now: NaiveDateTime,
) -> Result<DocumentExpiryReport, DbErr> {
    let settings = &app.config.reminders;
    let horizon = now + chrono::Duration::days(settings.document_lookahead_days);
    let dedup_since = now - chrono::Duration::hours(settings.dedup_window_hours);

    let documents = document::Entity::find()
        .filter(document::Column::ExpiresAt.gt(now))
        .filter(document::Column::ExpiresAt.lte(horizon))
        .order_by_asc(document::Column::ExpiresAt)
        .all(&app.db)
        .await?;

    let mut report = DocumentExpiryReport {
        scanned: documents.len(),
        ..DocumentExpiryReport::default()
    };

    for document in documents {
        let days = days_until_expiry(document.expires_at, now);
        if !settings.document_thresholds_days.contains(&days) {
            continue;
        }

        let reminder = Reminder {
            user_id: document.user_id,
            kind: kinds::DOCUMENT_EXPIRY,
            message: format!(
                "Your document \"{}\" expires in {} day(s).",
                document.title, days
            ),
            key: idempotency_key(document.id, days),
        };

        match notifications::send_once(&app.db, reminder, Some(dedup_since), now).await? {
            Some(notification) => {
                debug!("📄 Reminded user {} about document {}", document.user_id, document.id);
                report.created += 1;
                // The row is stored; a retry would dedup it and never push again
                if let Err(e) = announce(app, notification).await {
                    error!(
                        "Failed to push document reminder to user {}: {}",
                        document.user_id, e
                    );
                }
            }
            None => report.duplicates += 1,
        }
    }

    info!(
        "📄 Document expiry: {} scanned, {} reminders created, {} already sent",
        report.scanned, report.created, report.duplicates
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
    use uuid::Uuid;

    use super::*;
    use crate::{
        broadcaster::Broadcaster,
        database::models::notification,
        tests::{fixtures, setup_test::setup_test},
    };

    fn at(hour: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    async fn notifications_for(test: &crate::tests::setup_test::TestUtils, user_id: Uuid) -> u64 {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .count(&test.db)
            .await
            .unwrap()
    }

    #[test]
    fn test_days_round_up() {
        let now = at(9);

        assert_eq!(days_until_expiry(now + chrono::Duration::days(7), now), 7);
        assert_eq!(days_until_expiry(now + chrono::Duration::hours(6 * 24 + 1), now), 7);
        assert_eq!(days_until_expiry(now + chrono::Duration::hours(2), now), 1);
        assert_eq!(days_until_expiry(now - chrono::Duration::hours(2), now), 0);
    }

    #[tokio::test]
    async fn test_threshold_documents_are_reminded_once() {
        let test = setup_test().await;
        let now = at(9);
        let user = Uuid::new_v4();
        for days in [30, 7, 1] {
            let expires_at = now + chrono::Duration::days(days);
            fixtures::document(&test.db, user, &format!("Licence {days}"), expires_at).await;
        }

        let first = remind_expiring_documents(&test.app, now).await.unwrap();
        let second = remind_expiring_documents(&test.app, now + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(first.created, 3);
        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(notifications_for(&test, user).await, 3);
    }

    #[tokio::test]
    async fn test_non_threshold_documents_are_ignored() {
        let test = setup_test().await;
        let now = at(9);
        let user = Uuid::new_v4();
        for days in [29, 6, 45] {
            let expires_at = now + chrono::Duration::days(days);
            fixtures::document(&test.db, user, "Certificate", expires_at).await;
        }

        let report = remind_expiring_documents(&test.app, now).await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.created, 0);
        assert_eq!(notifications_for(&test, user).await, 0);
    }

    #[tokio::test]
    async fn test_similar_titles_do_not_suppress_each_other() {
        let test = setup_test().await;
        let now = at(9);
        let user = Uuid::new_v4();
        fixtures::document(&test.db, user, "Export", now + chrono::Duration::days(7)).await;
        fixtures::document(&test.db, user, "Export licence", now + chrono::Duration::days(7)).await;

        let report = remind_expiring_documents(&test.app, now).await.unwrap();

        assert_eq!(report.created, 2);
    }

    #[tokio::test]
    async fn test_failed_push_keeps_the_reminder() {
        let mut test = setup_test().await;
        let now = at(9);
        let user = Uuid::new_v4();
        let expires_at = now + chrono::Duration::days(7);
        fixtures::document(&test.db, user, "Export licence", expires_at).await;
        test.app.broadcaster = Broadcaster::Database;
        test.db
            .execute_unprepared("DROP TABLE websocket_message")
            .await
            .unwrap();

        let report = remind_expiring_documents(&test.app, now).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(notifications_for(&test, user).await, 1);
    }

    #[tokio::test]
    async fn test_reminder_message_names_the_document() {
        let test = setup_test().await;
        let now = at(9);
        let user = Uuid::new_v4();
        let expires_at = now + chrono::Duration::days(1);
        let document = fixtures::document(&test.db, user, "Halal certificate", expires_at).await;

        remind_expiring_documents(&test.app, now).await.unwrap();

        let created = notification::Entity::find().one(&test.db).await.unwrap().unwrap();
        assert_eq!(created.r#type, "document_expiry");
        assert_eq!(created.message, "Your document \"Halal certificate\" expires in 1 day(s).");
        assert_eq!(created.link, Some(idempotency_key(document.id, 1)));
        assert!(!created.is_read);
    }
}
