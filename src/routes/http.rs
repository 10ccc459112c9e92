//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures become `{error, code}` bodies via
//! `AppError`'s `IntoResponse`.

use std::sync::Arc;
use axum::{extract::{FromRequestParts, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// `Path` whose rejection (e.g. `/cards/-1/flip`) renders as an `{error, code}` body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> Json<SessionOut> {
  let out = logic::new_session(&state).await;
  info!(target: "flashcards", session = %out.id, "HTTP session created");
  Json(out)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  ApiPath(session_id): ApiPath<String>,
) -> Result<Json<SessionOut>, AppError> {
  logic::snapshot(&state, &session_id).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(%session_id, name = %body.name, encoded_len = body.data_base64.len()))]
pub async fn http_post_upload(
  State(state): State<Arc<AppState>>,
  ApiPath(session_id): ApiPath<String>,
  Json(body): Json<UploadIn>,
) -> Result<Json<SessionOut>, AppError> {
  logic::upload_file(&state, &session_id, &body.name, &body.mime, &body.data_base64)
    .await
    .map(Json)
}

#[instrument(level = "info", skip(state, body), fields(%session_id, topic_len = body.topic.len(), card_count = ?body.card_count))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  ApiPath(session_id): ApiPath<String>,
  Json(body): Json<GenerateIn>,
) -> Result<Json<SessionOut>, AppError> {
  let out = logic::generate(&state, &session_id, &body.topic, body.card_count).await?;
  info!(target: "flashcards", %session_id, cards = out.cards.len(), "HTTP generate served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_flip(
  State(state): State<Arc<AppState>>,
  ApiPath((session_id, index)): ApiPath<(String, usize)>,
) -> Result<Json<SessionOut>, AppError> {
  logic::toggle_flip(&state, &session_id, index).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_card(
  State(state): State<Arc<AppState>>,
  ApiPath((session_id, index)): ApiPath<(String, usize)>,
) -> Result<Json<SessionOut>, AppError> {
  logic::delete_card(&state, &session_id, index).await.map(Json)
}
