//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - Body limit sized for base64 uploads (`max_upload_bytes`)
/// - CORS (allow any origin/method/headers); tighten for production
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/sessions", post(http::http_create_session))
        .route("/api/v1/sessions/:id", get(http::http_get_session))
        .route("/api/v1/sessions/:id/upload", post(http::http_post_upload))
        .route("/api/v1/sessions/:id/generate", post(http::http_post_generate))
        .route(
            "/api/v1/sessions/:id/cards/:index/flip",
            post(http::http_post_flip),
        )
        .route(
            "/api/v1/sessions/:id/cards/:index",
            axum::routing::delete(http::http_delete_card),
        )
        // State + limits + CORS + HTTP tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut cfg = AppConfig::default();
        cfg.llm.base_url = "http://127.0.0.1:1".into();
        build_router(Arc::new(AppState::with_config(cfg).expect("state")))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_generate_without_input_is_rejected_locally() {
        let app = app();
        let (status, session) = call(&app, "POST", "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        let id = session["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/generate"),
            Some(serde_json::json!({"topic": "", "cardCount": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_INPUT");
        assert_eq!(body["error"], crate::error::MSG_MISSING_INPUT);

        let (_, snapshot) = call(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(snapshot["cards"], serde_json::json!([]));
        assert_eq!(snapshot["error"], crate::error::MSG_MISSING_INPUT);
        assert_eq!(snapshot["generating"], false);
    }

    #[tokio::test]
    async fn test_upload_then_snapshot_shows_file() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let app = app();
        let (_, session) = call(&app, "POST", "/api/v1/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/upload"),
            Some(serde_json::json!({
                "name": "paper.pdf",
                "mime": "application/pdf",
                "dataBase64": STANDARD.encode(b"%PDF-1.4"),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["upload"], serde_json::json!({"name": "paper.pdf", "kind": "pdf"}));
    }

    #[tokio::test]
    async fn test_unknown_session_and_card() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/sessions/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SESSION_NOT_FOUND");

        let (_, session) = call(&app, "POST", "/api/v1/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();
        let (status, body) = call(&app, "POST", &format!("/api/v1/sessions/{id}/cards/0/flip"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "CARD_NOT_FOUND");
        let (status, _) = call(&app, "DELETE", &format!("/api/v1/sessions/{id}/cards/3"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_card_index_gets_json_error() {
        let app = app();
        let (_, session) = call(&app, "POST", "/api/v1/sessions", None).await;
        let id = session["id"].as_str().unwrap().to_string();

        for (method, uri) in [
            ("POST", format!("/api/v1/sessions/{id}/cards/-1/flip")),
            ("POST", format!("/api/v1/sessions/{id}/cards/abc/flip")),
            ("DELETE", format!("/api/v1/sessions/{id}/cards/-1")),
        ] {
            let (status, body) = call(&app, method, &uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["code"], "BAD_PATH");
            assert_eq!(body["error"], "Invalid request.");
        }
    }
}
