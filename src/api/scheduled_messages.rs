use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{error::ApiError, validated_json::ValidatedJson},
    app::App,
    auth::CurrentUser,
    database::models::scheduled_message,
    messaging,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMessageRequest {
    pub conversation_id: Uuid,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    pub due_at: DateTime<Utc>,
}

/// Queues a chat message for the dispatcher job.
pub async fn create(
    State(app): State<App>,
    user: CurrentUser,
    ValidatedJson(request): ValidatedJson<ScheduleMessageRequest>,
) -> Result<(StatusCode, Json<scheduled_message::Model>), ApiError> {
    let now = Utc::now();
    if request.due_at <= now {
        return Err(ApiError::BadRequest("dueAt must be in the future".to_string()));
    }

    let scheduled = messaging::schedule_message(
        &app.db,
        request.conversation_id,
        user.id,
        &request.content,
        request.due_at.naive_utc(),
        now.naive_utc(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(scheduled)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::{
        auth::generate_token,
        tests::{fixtures, setup_test::setup_test},
    };

    fn in_an_hour() -> String {
        (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339()
    }

    #[tokio::test]
    async fn test_participant_can_schedule_a_message() {
        let test = setup_test().await;
        let alice = Uuid::new_v4();
        let conversation = fixtures::conversation(&test.db, &[alice, Uuid::new_v4()]).await;
        let token = generate_token(&test.app.config, alice).unwrap();

        let response = test
            .server
            .post("/api/scheduled-messages")
            .authorization_bearer(&token)
            .json(&json!({
                "conversationId": conversation,
                "content": "  See you at the fair  ",
                "dueAt": in_an_hour(),
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["content"], "See you at the fair");
        assert_eq!(body["status"], "pending");
        assert_eq!(body["senderId"], alice.to_string());
    }

    #[tokio::test]
    async fn test_outsider_is_forbidden() {
        let test = setup_test().await;
        let conversation = fixtures::conversation(&test.db, &[Uuid::new_v4()]).await;
        let token = generate_token(&test.app.config, Uuid::new_v4()).unwrap();

        test.server
            .post("/api/scheduled-messages")
            .authorization_bearer(&token)
            .json(&json!({
                "conversationId": conversation,
                "content": "hello",
                "dueAt": in_an_hour(),
            }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_rejected() {
        let test = setup_test().await;
        let alice = Uuid::new_v4();
        let conversation = fixtures::conversation(&test.db, &[alice]).await;
        let token = generate_token(&test.app.config, alice).unwrap();

        let empty = test
            .server
            .post("/api/scheduled-messages")
            .authorization_bearer(&token)
            .json(&json!({ "conversationId": conversation, "content": "", "dueAt": in_an_hour() }))
            .await;
        empty.assert_status(StatusCode::BAD_REQUEST);
        assert!(empty.json::<Value>()["fields"]["content"].is_array());

        let past = (chrono::Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
        test.server
            .post("/api/scheduled-messages")
            .authorization_bearer(&token)
            .json(&json!({ "conversationId": conversation, "content": "late", "dueAt": past }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
