use axum::extract::State;

use crate::app::{App, ReadinessError};

pub async fn ok() -> &'static str {
    "OK"
}

/// Ready once the database answers.
pub async fn ready(State(app): State<App>) -> Result<&'static str, ReadinessError> {
    app.db.ping().await?;
    Ok("OK")
}

#[cfg(test)]
mod tests {
    use crate::tests::setup_test::setup_test;

    #[tokio::test]
    async fn test_liveness_and_readiness() {
        let test = setup_test().await;

        test.server.get("/liveness").await.assert_text("OK");
        test.server.get("/readiness").await.assert_text("OK");
    }
}
