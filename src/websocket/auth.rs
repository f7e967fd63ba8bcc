use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{app::App, auth::jwt, websocket::connections::handle_socket};

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// Browsers cannot set headers on WebSocket requests, so the query
/// parameter is checked first.
fn extract_token(query: WsAuthQuery, headers: &HeaderMap) -> Option<String> {
    query.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(ToString::to_string)
    })
}

/// Upgrades to a chat socket once the JWT checks out.
pub async fn authenticated_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    State(app): State<App>,
) -> Response {
    let Some(token) = extract_token(query, &headers) else {
        return (StatusCode::UNAUTHORIZED, "Missing token").into_response();
    };

    let Ok(user_id) = jwt::verify_user(&app.config, &token) else {
        return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(app, user_id, socket))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_query_token_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        let token = extract_token(
            WsAuthQuery {
                token: Some("from-query".to_string()),
            },
            &headers,
        );

        assert_eq!(token.as_deref(), Some("from-query"));
    }

    #[test]
    fn test_header_token_is_used_without_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        let token = extract_token(WsAuthQuery { token: None }, &headers);

        assert_eq!(token.as_deref(), Some("from-header"));
    }
}
