use axum::{
    routing::{get, post},
    Router,
};

use crate::app::App;

pub mod error;
pub mod health_checks;
pub mod json_error;
pub mod notifications;
pub mod scheduled_messages;
pub mod spotlights;
pub mod validated_json;

/// Routes mounted under `/api`.
pub fn routes() -> Router<App> {
    Router::new()
        .route("/notifications", get(notifications::index))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/scheduled-messages", post(scheduled_messages::create))
        .route("/spotlights/today", get(spotlights::today))
}
