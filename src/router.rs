use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{api, app::App, websocket::auth::authenticated_ws_handler};

pub fn router(app: App) -> Router {
    Router::new()
        .route("/liveness", get(api::health_checks::ok))
        .route("/readiness", get(api::health_checks::ready))
        .route("/ws", get(authenticated_ws_handler))
        .nest("/api", api::routes())
        .with_state(app)
        .layer(TraceLayer::new_for_http())
}
