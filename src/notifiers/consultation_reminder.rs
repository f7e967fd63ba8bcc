use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    app::App,
    database::models::consultation::{self, ConsultationStatus},
    jobs::{Job, JobError},
    notifications::{self, kinds, Reminder},
    notifiers::announce,
};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConsultationReminderArguments {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ConsultationReminderReport {
    pub consultations: usize,
    pub created: usize,
    pub duplicates: usize,
}

pub struct ConsultationReminderJob;

impl Job for ConsultationReminderJob {
    type Arguments = ConsultationReminderArguments;
    type Report = ConsultationReminderReport;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<Self::Report, JobError> {
        let now = arguments.as_of.unwrap_or_else(Utc::now).naive_utc();
        Ok(remind_upcoming_consultations(app, now).await?)
    }

    fn name() -> &'static str {
        "consultation_reminders"
    }
}

/// Short form used in idempotency keys: `1h`, `24h`, `30m`
fn lead_label(lead_minutes: i64) -> String {
    if lead_minutes % 60 == 0 {
        format!("{}h", lead_minutes / 60)
    } else {
        format!("{lead_minutes}m")
    }
}

fn lead_phrase(lead_minutes: i64) -> String {
    match lead_minutes {
        1440 => "1 day".to_string(),
        60 => "1 hour".to_string(),
        m if m % 1440 == 0 => format!("{} days", m / 1440),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        m => format!("{m} minutes"),
    }
}

pub fn idempotency_key(
    consultation_id: uuid::Uuid,
    lead_minutes: i64,
    starts_at: NaiveDateTime,
) -> String {
    format!(
        "consultation-reminder:{consultation_id}:{}:{}",
        lead_label(lead_minutes),
        starts_at.format("%Y%m%d%H%M")
    )
}

/// Reminds buyer and provider of approved consultations starting within
/// `[now + lead + offset, now + lead + offset + tolerance)` for each
/// configured lead.
///
/// Bands of consecutive ticks meet end to end when the tolerance equals the
/// cron interval, so `now` must be the tick time rather than the time the
/// run happens to start.
pub async fn remind_upcoming_consultations(
    app: &App,
    now: NaiveDateTime,
) -> Result<ConsultationReminderReport, DbErr> {
    let settings = &app.config.reminders;
    let tolerance = chrono::Duration::minutes(settings.consultation_tolerance_minutes);
    let offset = chrono::Duration::minutes(settings.consultation_band_offset_minutes);
    let mut report = ConsultationReminderReport::default();

    for &lead_minutes in &settings.consultation_leads_minutes {
        let window_start = now + chrono::Duration::minutes(lead_minutes) + offset;
        let window_end = window_start + tolerance;

        let consultations = consultation::Entity::find()
            .filter(consultation::Column::Status.eq(ConsultationStatus::Approved))
            .filter(consultation::Column::StartsAt.gte(window_start))
            .filter(consultation::Column::StartsAt.lt(window_end))
            .order_by_asc(consultation::Column::StartsAt)
            .all(&app.db)
            .await?;

        debug!(
            "🗓️ {} consultation(s) starting in {} ({} to {})",
            consultations.len(),
            lead_phrase(lead_minutes),
            window_start,
            window_end
        );
        report.consultations += consultations.len();

        for consultation in consultations {
            let key = idempotency_key(consultation.id, lead_minutes, consultation.starts_at);
            let message = format!(
                "Reminder: your consultation \"{}\" starts in {} ({} UTC).",
                consultation.topic,
                lead_phrase(lead_minutes),
                consultation.starts_at.format("%Y-%m-%d %H:%M")
            );

            for user_id in [consultation.buyer_id, consultation.provider_id] {
                let reminder = Reminder {
                    user_id,
                    kind: kinds::CONSULTATION_REMINDER,
                    message: message.clone(),
                    key: key.clone(),
                };

                match notifications::send_once(&app.db, reminder, None, now).await? {
                    Some(notification) => {
                        report.created += 1;
                        // The row is stored; a retry would dedup it and never push again
                        if let Err(e) = announce(app, notification).await {
                            error!(
                                "Failed to push consultation reminder to user {}: {}",
                                user_id, e
                            );
                        }
                    }
                    None => report.duplicates += 1,
                }
            }
        }
    }

    info!(
        "🗓️ Consultation reminders: {} consultation(s), {} reminders created, {} already sent",
        report.consultations, report.created, report.duplicates
    );

    Ok(report)
}
