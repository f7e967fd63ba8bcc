//! Rows other marketplace services own, inserted directly for tests.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::database::models::{
    company,
    consultation::{self, ConsultationStatus},
    conversation_participant, document,
    scheduled_message::{self, ScheduledMessageStatus},
    spotlight,
};

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Creates a conversation between `participants` and returns its id.
pub async fn conversation(db: &DatabaseConnection, participants: &[Uuid]) -> Uuid {
    let conversation_id = Uuid::new_v4();

    for &user_id in participants {
        conversation_participant::ActiveModel {
            conversation_id: Set(conversation_id),
            user_id: Set(user_id),
        }
        .insert(db)
        .await
        .expect("Failed to insert participant");
    }

    conversation_id
}

pub async fn document(
    db: &DatabaseConnection,
    user_id: Uuid,
    title: &str,
    expires_at: NaiveDateTime,
) -> document::Model {
    document::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        title: Set(title.to_string()),
        expires_at: Set(expires_at),
        created_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert document")
}

pub async fn consultation(
    db: &DatabaseConnection,
    buyer_id: Uuid,
    provider_id: Uuid,
    starts_at: NaiveDateTime,
    status: ConsultationStatus,
) -> consultation::Model {
    consultation::ActiveModel {
        id: Set(Uuid::new_v4()),
        buyer_id: Set(buyer_id),
        provider_id: Set(provider_id),
        topic: Set("Sourcing cashew nuts".to_string()),
        starts_at: Set(starts_at),
        status: Set(status),
        created_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert consultation")
}

pub async fn company(
    db: &DatabaseConnection,
    name: &str,
    is_verified: bool,
    rating: f64,
    is_active: bool,
) -> company::Model {
    company::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        industry: Set(Some("agriculture".to_string())),
        country: Set(Some("Ghana".to_string())),
        is_verified: Set(is_verified),
        is_active: Set(is_active),
        rating: Set(rating),
        trust_score: Set(50),
        created_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert company")
}

pub async fn scheduled_message(
    db: &DatabaseConnection,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    due_at: NaiveDateTime,
) -> scheduled_message::Model {
    scheduled_message::ActiveModel {
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
        created_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert scheduled message")
}

pub async fn spotlight(
    db: &DatabaseConnection,
    date: NaiveDate,
    position: i32,
    company_id: Uuid,
) -> spotlight::Model {
    spotlight::ActiveModel {
        id: Set(Uuid::new_v4()),
        date: Set(date),
        position: Set(position),
        company_id: Set(company_id),
        blurb: Set("Featured supplier".to_string()),
        created_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert spotlight")
}
