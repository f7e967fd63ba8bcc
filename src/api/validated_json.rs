use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::json_error::JsonError;

/// Deserializes a JSON body and runs its `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = JsonError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(JsonError::InvalidJson)?;

        value.validate().map_err(JsonError::ValidationError)?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, routing::post, Router};
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Greeting {
        #[validate(length(min = 1, max = 10))]
        content: String,
    }

    async fn echo(ValidatedJson(greeting): ValidatedJson<Greeting>) -> String {
        greeting.content
    }

    fn server() -> TestServer {
        TestServer::new(Router::new().route("/", post(echo))).unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_reaches_handler() {
        let response = server().post("/").json(&json!({ "content": "salaam" })).await;

        response.assert_status_ok();
        response.assert_text("salaam");
    }

    #[tokio::test]
    async fn test_validation_errors_name_the_field() {
        let response = server().post("/").json(&json!({ "content": "" })).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Validation failed");
        assert!(body["fields"].get("content").is_some());
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let response = server().post("/").text("{ not json").await;

        assert!(response.status_code().is_client_error());
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }
}
