//! The recurring jobs of the marketplace: reminders, scheduled chat messages
//! and the daily spotlight.

use sea_orm::DbErr;

use crate::{
    app::App,
    config::ScheduleConfig,
    database::models::notification,
    jobs::{job_registry::JobRegistry, scheduled_job::ScheduledJob, Job},
    websocket::{listener::RecipientCriteria, message::ServerEvent},
};

pub mod consultation_reminder;
pub mod document_expiry;
pub mod scheduled_messages;
pub mod spotlight_rotation;

use consultation_reminder::ConsultationReminderJob;
use document_expiry::DocumentExpiryJob;
use scheduled_messages::ScheduledMessagesJob;
use spotlight_rotation::SpotlightRotationJob;

#[must_use]
pub fn job_registry() -> JobRegistry {
    JobRegistry::new()
        .with_job::<DocumentExpiryJob>()
        .with_job::<ScheduledMessagesJob>()
        .with_job::<SpotlightRotationJob>()
        .with_job::<ConsultationReminderJob>()
}

#[must_use]
pub fn job_schedule(schedule: &ScheduleConfig) -> Vec<ScheduledJob> {
    vec![
        ScheduledJob::new(DocumentExpiryJob::name(), &schedule.document_expiry),
        ScheduledJob::new(ScheduledMessagesJob::name(), &schedule.scheduled_messages),
        ScheduledJob::new(SpotlightRotationJob::name(), &schedule.spotlight_rotation),
        ScheduledJob::new(
            ConsultationReminderJob::name(),
            &schedule.consultation_reminders,
        ),
    ]
}

/// Pushes a freshly created notification to the user's open sockets.
pub(crate) async fn announce(app: &App, notification: notification::Model) -> Result<(), DbErr> {
    let criteria = RecipientCriteria::User {
        user_id: notification.user_id,
    };

    app.broadcaster
        .emit(&app.db, criteria, &ServerEvent::NewNotification(notification))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scheduled_job_is_registered() {
        let registry = job_registry();
        let schedule = job_schedule(&ScheduleConfig::default());

        assert_eq!(schedule.len(), 4);
        for scheduled_job in &schedule {
            assert!(registry.contains(scheduled_job.job_name));
            assert!(scheduled_job.schedule().is_ok());
        }
    }
}
