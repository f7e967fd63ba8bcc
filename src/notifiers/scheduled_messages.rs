use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    app::App,
    database::models::{
        message,
        scheduled_message::{self, ScheduledMessageStatus},
    },
    jobs::{Job, JobError},
    messaging::{self, MessagingError},
    websocket::{listener::RecipientCriteria, message::ServerEvent, relay::rooms},
};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScheduledMessagesArguments {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct DispatchReport {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    /// Gave up after the last allowed attempt
    pub abandoned: usize,
}

pub struct ScheduledMessagesJob;

impl Job for ScheduledMessagesJob {
    type Arguments = ScheduledMessagesArguments;
    type Report = DispatchReport;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<Self::Report, JobError> {
        let now = arguments.as_of.unwrap_or_else(Utc::now).naive_utc();
        Ok(dispatch_due_messages(app, now).await?)
    }

    fn name() -> &'static str {
        "scheduled_messages"
    }
}

/// Delivers pending scheduled messages that are due, oldest first.
///
/// A failing message is recorded on its row and does not stop the others.
pub async fn dispatch_due_messages(app: &App, now: NaiveDateTime) -> Result<DispatchReport, DbErr> {
    let settings = &app.config.scheduled_messages;

    let due = scheduled_message::Entity::find()
        .filter(scheduled_message::Column::Status.eq(ScheduledMessageStatus::Pending))
        .filter(scheduled_message::Column::DueAt.lte(now))
        .order_by_asc(scheduled_message::Column::DueAt)
        .limit(settings.batch_size)
        .all(&app.db)
        .await?;

    let mut report = DispatchReport {
        due: due.len(),
        ..DispatchReport::default()
    };

    for scheduled in due {
        match deliver(&app.db, &scheduled, now).await {
            Ok(Some(message)) => {
                report.sent += 1;
                let conversation_id = message.conversation_id;
                let criteria = RecipientCriteria::Room {
                    room: rooms::conversation(conversation_id),
                    except: None,
                };
                // The message is stored; a lost real-time event is picked up on next fetch
                if let Err(e) = app
                    .broadcaster
                    .emit(&app.db, criteria, &ServerEvent::NewMessage(message))
                    .await
                {
                    error!(
                        "Failed to emit scheduled message to conversation {}: {}",
                        conversation_id, e
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                report.failed += 1;
                if record_failure(&app.db, scheduled, &e, settings.max_attempts).await? {
                    report.abandoned += 1;
                }
            }
        }
    }

    if report.due > 0 {
        info!(
            "✉️ Scheduled messages: {} due, {} sent, {} failed ({} abandoned)",
            report.due, report.sent, report.failed, report.abandoned
        );
    }

    Ok(report)
}

/// Sends one scheduled message in a transaction. `None` when another run
/// already delivered it.
async fn deliver(
    db: &DatabaseConnection,
    scheduled: &scheduled_message::Model,
    now: NaiveDateTime,
) -> Result<Option<message::Model>, MessagingError> {
    let txn = db.begin().await?;

    let result = async {
        let message = messaging::send_message(
            &txn,
            scheduled.conversation_id,
            scheduled.sender_id,
            &scheduled.content,
            now,
        )
        .await?;

        let marked = scheduled_message::Entity::update_many()
            .col_expr(
                scheduled_message::Column::Status,
                Expr::value(ScheduledMessageStatus::Sent),
            )
            .col_expr(scheduled_message::Column::MessageId, Expr::value(message.id))
            .col_expr(scheduled_message::Column::SentAt, Expr::value(now))
            .col_expr(
                scheduled_message::Column::Attempts,
                Expr::value(scheduled.attempts + 1),
            )
            .col_expr(
                scheduled_message::Column::LastError,
                Expr::value(Option::<String>::None),
            )
            .filter(scheduled_message::Column::Id.eq(scheduled.id))
            .filter(scheduled_message::Column::Status.eq(ScheduledMessageStatus::Pending))
            .exec(&txn)
            .await?;

        Ok::<_, MessagingError>((marked.rows_affected == 1).then_some(message))
    }
    .await;

    match result {
        Ok(Some(message)) => {
            txn.commit().await?;
            Ok(Some(message))
        }
        Ok(None) => {
            txn.rollback().await?;
            Ok(None)
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

/// Returns whether the message was given up on.
async fn record_failure(
    db: &DatabaseConnection,
    scheduled: scheduled_message::Model,
    error: &MessagingError,
    max_attempts: i32,
) -> Result<bool, DbErr> {
    let attempts = scheduled.attempts + 1;
    let abandoned = attempts >= max_attempts;

    if abandoned {
        error!(
            "✉️ Giving up on scheduled message {} after {} attempts: {}",
            scheduled.id, attempts, error
        );
    } else {
        warn!(
            "✉️ Scheduled message {} failed (attempt {}/{}): {}",
            scheduled.id, attempts, max_attempts, error
        );
    }

    let mut active: scheduled_message::ActiveModel = scheduled.into();
    active.attempts = Set(attempts);
    active.last_error = Set(Some(error.to_string()));
    if abandoned {
        active.status = Set(ScheduledMessageStatus::Failed);
    }
    active.update(db).await?;

    Ok(abandoned)
}
