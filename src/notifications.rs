use chrono::NaiveDateTime;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::database::models::notification;

pub mod kinds {
    pub const DOCUMENT_EXPIRY: &str = "document_expiry";
    pub const CONSULTATION_REMINDER: &str = "consultation_reminder";
}

/// A notification a reminder job wants to send, keyed for idempotency.
///
/// The key is stored in `link`, so a notification for the same entity and
/// threshold can be found again on the next tick.
#[derive(Debug, Clone)]
pub struct Reminder {
    pub user_id: Uuid,
    pub kind: &'static str,
    pub message: String,
    pub key: String,
}

/// Whether `user_id` already received a notification carrying `key`,
/// optionally only counting those created at or after `since`.
pub async fn already_sent(
    db: &impl ConnectionTrait,
    user_id: Uuid,
    key: &str,
    since: Option<NaiveDateTime>,
) -> Result<bool, DbErr> {
    let mut query = notification::Entity::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::Link.eq(key));

    if let Some(since) = since {
        query = query.filter(notification::Column::CreatedAt.gte(since));
    }

    Ok(query.count(db).await? > 0)
}

/// Inserts the reminder unless an equivalent one exists.
///
/// Returns the created row, or `None` when it was a duplicate.
pub async fn send_once(
    db: &impl ConnectionTrait,
    reminder: Reminder,
    since: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<Option<notification::Model>, DbErr> {
    if already_sent(db, reminder.user_id, &reminder.key, since).await? {
        return Ok(None);
    }

    let created = notification::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(reminder.user_id),
        r#type: Set(reminder.kind.to_string()),
        message: Set(reminder.message),
        is_read: Set(false),
        link: Set(Some(reminder.key)),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(Some(created))
}

pub async fn list_for_user(
    db: &impl ConnectionTrait,
    user_id: Uuid,
    unread_only: bool,
    limit: u64,
) -> Result<Vec<notification::Model>, DbErr> {
    let mut query = notification::Entity::find().filter(notification::Column::UserId.eq(user_id));

    if unread_only {
        query = query.filter(notification::Column::IsRead.eq(false));
    }

    query
        .order_by_desc(notification::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await
}

/// Marks one of the user's notifications read. `false` when the user has no
/// notification with that id.
pub async fn mark_read(
    db: &impl ConnectionTrait,
    user_id: Uuid,
    notification_id: Uuid,
) -> Result<bool, DbErr> {
    let result = notification::Entity::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::Id.eq(notification_id))
        .filter(notification::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

pub async fn mark_all_read(db: &impl ConnectionTrait, user_id: Uuid) -> Result<u64, DbErr> {
    let result = notification::Entity::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
