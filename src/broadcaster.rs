use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};
use uuid::Uuid;

use crate::{
    database::models::websocket_message,
    websocket::{listener::RecipientCriteria, message::ServerEvent, relay::ChatRelay},
};

/// How real-time events reach chat sockets.
///
/// `Database` stores the event so the `NOTIFY` listener of every instance can
/// deliver it; `Local` hands it straight to this process's relay.
#[derive(Debug, Clone)]
pub enum Broadcaster {
    Database,
    Local(ChatRelay),
}

impl Broadcaster {
    pub async fn emit(
        &self,
        db: &impl ConnectionTrait,
        criteria: RecipientCriteria,
        event: &ServerEvent,
    ) -> Result<(), DbErr> {
        let payload = serde_json::to_value(event)
            .map_err(|e| DbErr::Custom(format!("Failed to serialize event: {e}")))?;

        match self {
            Self::Database => {
                let recipient_criteria = serde_json::to_value(&criteria)
                    .map_err(|e| DbErr::Custom(format!("Failed to serialize criteria: {e}")))?;

                websocket_message::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    recipient_criteria: Set(recipient_criteria),
                    payload: Set(payload),
                    created_at: Set(chrono::Utc::now().naive_utc()),
                }
                .insert(db)
                .await?;
            }
            Self::Local(relay) => {
                relay.deliver(&criteria, &payload.to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::EntityTrait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{tests::setup_test::setup_test, websocket::relay::rooms};

    #[tokio::test]
    async fn test_local_broadcaster_delivers_immediately() {
        let test = setup_test().await;
        let relay = ChatRelay::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let user_id = Uuid::new_v4();
        relay.connect(user_id, tx);

        Broadcaster::Local(relay)
            .emit(
                &test.db,
                RecipientCriteria::User { user_id },
                &ServerEvent::error("boom"),
            )
            .await
            .unwrap();

        let received: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(received["event"], "error");
        assert_eq!(received["data"]["message"], "boom");
    }

    #[tokio::test]
    async fn test_database_broadcaster_stores_event() {
        let test = setup_test().await;
        let room = rooms::conversation(Uuid::new_v4());

        Broadcaster::Database
            .emit(
                &test.db,
                RecipientCriteria::Room {
                    room: room.clone(),
                    except: None,
                },
                &ServerEvent::error("boom"),
            )
            .await
            .unwrap();

        let stored = websocket_message::Entity::find().one(&test.db).await.unwrap().unwrap();
        assert_eq!(stored.recipient_criteria["room"], room.as_str());
        assert_eq!(stored.payload["event"], "error");
    }
}
