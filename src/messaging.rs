use chrono::NaiveDateTime;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    conversation_participant, message,
    scheduled_message::{self, ScheduledMessageStatus},
};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        conversation_id: Uuid,
        user_id: Uuid,
    },
    #[error("message content is empty")]
    EmptyContent,
    #[error(transparent)]
    Database(#[from] DbErr),
}

pub async fn is_participant(
    db: &impl ConnectionTrait,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<bool, DbErr> {
    let count = conversation_participant::Entity::find()
        .filter(conversation_participant::Column::ConversationId.eq(conversation_id))
        .filter(conversation_participant::Column::UserId.eq(user_id))
        .count(db)
        .await?;

    Ok(count > 0)
}

async fn ensure_participant(
    db: &impl ConnectionTrait,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), MessagingError> {
    if is_participant(db, conversation_id, user_id).await? {
        Ok(())
    } else {
        Err(MessagingError::NotParticipant {
            conversation_id,
            user_id,
        })
    }
}

/// Stores a chat message from a conversation participant.
pub async fn send_message(
    db: &impl ConnectionTrait,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    now: NaiveDateTime,
) -> Result<message::Model, MessagingError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(MessagingError::EmptyContent);
    }

    ensure_participant(db, conversation_id, sender_id).await?;

    let created = message::ActiveModel {
        id: Set(Uuid::new_v4()),
        conversation_id: Set(conversation_id),
        sender_id: Set(sender_id),
        content: Set(content.to_string()),
        is_read: Set(false),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(created)
}

/// Marks messages from the other participants as read by `reader_id`.
pub async fn mark_read(
    db: &impl ConnectionTrait,
    conversation_id: Uuid,
    reader_id: Uuid,
) -> Result<u64, MessagingError> {
    ensure_participant(db, conversation_id, reader_id).await?;

    let result = message::Entity::update_many()
        .col_expr(message::Column::IsRead, Expr::value(true))
        .filter(message::Column::ConversationId.eq(conversation_id))
        .filter(message::Column::SenderId.ne(reader_id))
        .filter(message::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Queues a message for delivery at `due_at` by the dispatcher job.
pub async fn schedule_message(
    db: &impl ConnectionTrait,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    due_at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<scheduled_message::Model, MessagingError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(MessagingError::EmptyContent);
    }

    ensure_participant(db, conversation_id, sender_id).await?;

    let scheduled = scheduled_message::ActiveModel {
        id: Set(Uuid::new_v4()),
        conversation_id: Set(conversation_id),
        sender_id: Set(sender_id),
        content: Set(content.to_string()),
        due_at: Set(due_at),
        status: Set(ScheduledMessageStatus::Pending),
        attempts: Set(0),
        last_error: Set(None),
        message_id: Set(None),
        sent_at: Set(None),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    Ok(scheduled)
}
