use axum::{
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};
use thiserror::Error;

use crate::{
    broadcaster::Broadcaster,
    config::Config,
    copywriter::{Copywriter, CopywriterError},
    environment::Environment,
    websocket::relay::ChatRelay,
};

/// Shared state handed to request handlers, socket tasks and jobs.
#[derive(Clone, Debug)]
pub struct App {
    pub config: Config,
    pub environment: Environment,
    pub db: DatabaseConnection,
    /// Sockets connected to this instance
    pub relay: ChatRelay,
    pub broadcaster: Broadcaster,
    pub copywriter: Copywriter,
}

impl App {
    /// Builds the state for this process. Real-time events go through the
    /// database on PostgreSQL so every instance sees them.
    pub fn new(
        config: Config,
        environment: Environment,
        db: DatabaseConnection,
    ) -> Result<Self, CopywriterError> {
        let relay = ChatRelay::new();
        let broadcaster = match db.get_database_backend() {
            DatabaseBackend::Postgres => Broadcaster::Database,
            _ => Broadcaster::Local(relay.clone()),
        };
        let copywriter = Copywriter::from_config(&config.spotlight.copywriter)?;

        Ok(Self {
            config,
            environment,
            db,
            relay,
            broadcaster,
            copywriter,
        })
    }
}

impl FromRef<App> for Config {
    fn from_ref(app: &App) -> Self {
        app.config.clone()
    }
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("Database connection error")]
    DatabaseError(#[from] sea_orm::DbErr),
}

impl IntoResponse for ReadinessError {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
    }
}
