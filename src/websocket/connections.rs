use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use sea_orm::DbErr;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    app::App,
    messaging::{self, MessagingError},
    websocket::{
        listener::RecipientCriteria,
        message::{ClientEvent, ServerEvent},
        relay::{rooms, ConnectionId, UserId},
    },
};

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event: {0}")]
    InvalidFrame(#[from] serde_json::Error),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EventError {
    /// Text sent back to the client; store errors are not exposed
    fn client_message(&self) -> String {
        match self {
            Self::InvalidFrame(_) | Self::Messaging(MessagingError::EmptyContent) => {
                self.to_string()
            }
            Self::Messaging(MessagingError::NotParticipant { .. }) => {
                "You are not a participant of this conversation".to_string()
            }
            Self::Messaging(MessagingError::Database(_)) | Self::Database(_) => {
                "Internal error".to_string()
            }
        }
    }
}

/// Serves one authenticated chat socket until either side closes it.
pub async fn handle_socket(app: App, user_id: UserId, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection_id = app.relay.connect(user_id, tx);

    info!("🔌 WebSocket connection {} opened for user {}", connection_id, user_id);

    let mut outgoing = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(payload.into())).await {
                debug!("Failed to write to WebSocket: {}", e);
                break;
            }
        }
    });

    let incoming_app = app.clone();
    let mut incoming = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    handle_frame(&incoming_app, connection_id, user_id, text.as_str()).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut outgoing => incoming.abort(),
        _ = &mut incoming => outgoing.abort(),
    }

    disconnect(&app, connection_id).await;
    info!("🔌 WebSocket connection {} closed for user {}", connection_id, user_id);
}

async fn disconnect(app: &App, connection_id: ConnectionId) {
    let Some(user_id) = app.relay.disconnect(connection_id) else {
        return;
    };

    let event = ServerEvent::UserStatusChange {
        user_id,
        online: false,
    };
    if let Err(e) = app.broadcaster.emit(&app.db, RecipientCriteria::All, &event).await {
        error!("Failed to announce user {} offline: {}", user_id, e);
    }
}

/// Parses and handles one text frame, replying with an `error` event on failure.
pub async fn handle_frame(app: &App, connection_id: ConnectionId, user_id: UserId, text: &str) {
    let result = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_event(app, connection_id, user_id, event).await,
        Err(e) => Err(EventError::from(e)),
    };

    if let Err(e) = result {
        match &e {
            EventError::Database(_) | EventError::Messaging(MessagingError::Database(_)) => {
                error!("Failed to handle event from connection {}: {}", connection_id, e);
            }
            _ => debug!("Rejected event from connection {}: {}", connection_id, e),
        }
        reply(app, connection_id, &ServerEvent::error(e.client_message()));
    }
}

fn reply(app: &App, connection_id: ConnectionId, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(payload) => {
            app.relay.send_to_connection(connection_id, &payload);
        }
        Err(e) => error!("Failed to serialize event: {}", e),
    }
}

pub async fn handle_event(
    app: &App,
    connection_id: ConnectionId,
    user_id: UserId,
    event: ClientEvent,
) -> Result<(), EventError> {
    match event {
        ClientEvent::Join => {
            if app.relay.join(connection_id) {
                let event = ServerEvent::UserStatusChange {
                    user_id,
                    online: true,
                };
                app.broadcaster
                    .emit(&app.db, RecipientCriteria::All, &event)
                    .await?;
            }
        }
        ClientEvent::JoinConversation { conversation_id } => {
            ensure_participant(app, conversation_id, user_id).await?;
            app.relay
                .join_room(connection_id, &rooms::conversation(conversation_id));
        }
        ClientEvent::SendMessage {
            conversation_id,
            content,
        } => {
            let now = chrono::Utc::now().naive_utc();
            let message =
                messaging::send_message(&app.db, conversation_id, user_id, &content, now).await?;

            app.broadcaster
                .emit(
                    &app.db,
                    RecipientCriteria::Room {
                        room: rooms::conversation(conversation_id),
                        except: None,
                    },
                    &ServerEvent::NewMessage(message),
                )
                .await?;
        }
        ClientEvent::MarkRead { conversation_id } => {
            messaging::mark_read(&app.db, conversation_id, user_id).await?;

            app.broadcaster
                .emit(
                    &app.db,
                    RecipientCriteria::Room {
                        room: rooms::conversation(conversation_id),
                        except: None,
                    },
                    &ServerEvent::MessagesRead {
                        conversation_id,
                        reader_id: user_id,
                    },
                )
                .await?;
        }
        ClientEvent::TypingStart { conversation_id } => {
            emit_typing(app, connection_id, user_id, conversation_id, true).await?;
        }
        ClientEvent::TypingStop { conversation_id } => {
            emit_typing(app, connection_id, user_id, conversation_id, false).await?;
        }
        ClientEvent::GetOnlineUsers => {
            let event = ServerEvent::OnlineUsers {
                user_ids: app.relay.online_users(),
            };
            reply(app, connection_id, &event);
        }
    }

    Ok(())
}

async fn ensure_participant(
    app: &App,
    conversation_id: uuid::Uuid,
    user_id: UserId,
) -> Result<(), EventError> {
    if messaging::is_participant(&app.db, conversation_id, user_id).await? {
        Ok(())
    } else {
        Err(MessagingError::NotParticipant {
            conversation_id,
            user_id,
        }
        .into())
    }
}

async fn emit_typing(
    app: &App,
    connection_id: ConnectionId,
    user_id: UserId,
    conversation_id: uuid::Uuid,
    is_typing: bool,
) -> Result<(), EventError> {
    ensure_participant(app, conversation_id, user_id).await?;

    app.broadcaster
        .emit(
            &app.db,
            RecipientCriteria::Room {
                room: rooms::conversation(conversation_id),
                except: Some(connection_id),
            },
            &ServerEvent::UserTyping {
                conversation_id,
                user_id,
                is_typing,
            },
        )
        .await?;

    Ok(())
}
