use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{message, notification};

/// Frames sent by chat clients: `{ "event": "...", "data": { ... } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Announces the user as online
    Join,
    JoinConversation { conversation_id: Uuid },
    SendMessage { conversation_id: Uuid, content: String },
    MarkRead { conversation_id: Uuid },
    TypingStart { conversation_id: Uuid },
    TypingStop { conversation_id: Uuid },
    GetOnlineUsers,
}

/// Frames pushed to chat clients
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    NewMessage(message::Model),
    MessagesRead {
        conversation_id: Uuid,
        reader_id: Uuid,
    },
    UserTyping {
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
    OnlineUsers {
        user_ids: Vec<Uuid>,
    },
    UserStatusChange {
        user_id: Uuid,
        online: bool,
    },
    NewNotification(notification::Model),
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_client_events_use_event_and_data_fields() {
        let conversation_id = Uuid::new_v4();

        let event: ClientEvent = serde_json::from_value(json!({
            "event": "send_message",
            "data": { "conversationId": conversation_id, "content": "hello" }
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::SendMessage {
                conversation_id,
                content: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_unit_events_need_no_data() {
        let event: ClientEvent = serde_json::from_value(json!({ "event": "join" })).unwrap();

        assert_eq!(event, ClientEvent::Join);
    }

    #[test]
    fn test_server_event_shape() {
        let user_id = Uuid::new_v4();

        let value = serde_json::to_value(ServerEvent::UserStatusChange {
            user_id,
            online: true,
        })
        .unwrap();

        assert_eq!(
            value,
            json!({
                "event": "user_status_change",
                "data": { "userId": user_id, "online": true }
            })
        );
    }
}
