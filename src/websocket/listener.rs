use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    database::models::websocket_message,
    websocket::relay::{ChatRelay, ConnectionId, UserId},
};

pub const CHANNEL: &str = "websocket_new_message";

/// Rows are read by every instance, so they are only pruned once this old
const RETENTION_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipientCriteria {
    /// Every socket of one user
    User { user_id: UserId },
    /// Every socket in a room, optionally skipping the one that caused the event
    Room {
        room: String,
        except: Option<ConnectionId>,
    },
    Connection { connection_id: ConnectionId },
    All,
}

#[derive(Debug, Error)]
enum ListenerError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Fans out `websocket_message` rows announced by `NOTIFY` to local sockets.
pub async fn start_listener(db: DatabaseConnection, relay: ChatRelay) {
    if db.get_database_backend() != DatabaseBackend::Postgres {
        info!("WebSocket listener not started: events are delivered in-process");
        return;
    }

    loop {
        match listen_loop(&db, &relay).await {
            Ok(()) => warn!("WebSocket listener exited, restarting"),
            Err(e) => error!("WebSocket listener error: {}, restarting in 5s", e),
        }
        sleep(Duration::from_secs(5)).await;
    }
}

async fn listen_loop(db: &DatabaseConnection, relay: &ChatRelay) -> Result<(), ListenerError> {
    let mut listener = PgListener::connect_with(db.get_postgres_connection_pool()).await?;
    listener.listen(CHANNEL).await?;

    info!("WebSocket listener started on channel '{}'", CHANNEL);

    loop {
        let notification = listener.recv().await?;

        let Ok(message_id) = Uuid::parse_str(notification.payload()) else {
            warn!("Ignoring malformed notification payload '{}'", notification.payload());
            continue;
        };

        if let Err(e) = deliver_stored(db, relay, message_id).await {
            error!("Failed to deliver websocket message {}: {}", message_id, e);
        }

        prune(db).await?;
    }
}

async fn deliver_stored(
    db: &DatabaseConnection,
    relay: &ChatRelay,
    message_id: Uuid,
) -> Result<(), DbErr> {
    let Some(message) = websocket_message::Entity::find_by_id(message_id).one(db).await? else {
        debug!("Websocket message {} already pruned", message_id);
        return Ok(());
    };

    let criteria: RecipientCriteria = serde_json::from_value(message.recipient_criteria)
        .map_err(|e| DbErr::Custom(format!("invalid recipient criteria: {e}")))?;
    let payload = message.payload.to_string();

    relay.deliver(&criteria, &payload);
    Ok(())
}

async fn prune(db: &DatabaseConnection) -> Result<(), DbErr> {
    let cutoff = chrono::Utc::now().naive_utc() - chrono::Duration::seconds(RETENTION_SECONDS);

    websocket_message::Entity::delete_many()
        .filter(websocket_message::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;

    Ok(())
}
