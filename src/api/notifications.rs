use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::error::ApiError, app::App, auth::CurrentUser, database::models::notification,
    notifications,
};

const PAGE_SIZE: u64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// The caller's latest notifications, newest first.
pub async fn index(
    State(app): State<App>,
    user: CurrentUser,
    Query(query): Query<IndexQuery>,
) -> Result<Json<Vec<notification::Model>>, ApiError> {
    let notifications =
        notifications::list_for_user(&app.db, user.id, query.unread_only, PAGE_SIZE).await?;

    Ok(Json(notifications))
}

pub async fn mark_read(
    State(app): State<App>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if notifications::mark_read(&app.db, user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

pub async fn mark_all_read(
    State(app): State<App>,
    user: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let updated = notifications::mark_all_read(&app.db, user.id).await?;

    Ok(Json(json!({ "updated": updated })))
}
