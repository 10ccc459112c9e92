//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Attaching an upload to a session (content extraction)
//!   - Generating a deck (validation, busy guard, one model call)
//!   - Flipping and deleting cards
//!
//! Every operation returns the resulting session snapshot. Failures that the
//! page should display are also recorded in `Session::error`.

use tracing::{error, info, instrument, warn, Instrument};

use crate::domain::{Flashcard, DEFAULT_CARDS, MAX_CARDS, MIN_CARDS};
use crate::error::AppError;
use crate::extract::extract_upload;
use crate::prompt::build_request;
use crate::protocol::{to_out, SessionOut};
use crate::state::AppState;

/// Missing -> default; zero/garbage -> 1; everything clamped to [1, 20].
pub fn clamp_card_count(requested: Option<i64>) -> u32 {
  match requested {
    None => DEFAULT_CARDS,
    Some(n) => n.clamp(MIN_CARDS as i64, MAX_CARDS as i64) as u32,
  }
}

#[instrument(level = "info", skip(state))]
pub async fn new_session(state: &AppState) -> SessionOut {
  to_out(&state.create_session().await)
}

#[instrument(level = "debug", skip(state))]
pub async fn snapshot(state: &AppState, session_id: &str) -> Result<SessionOut, AppError> {
  state.get_session(session_id).await.map(|s| to_out(&s))
}

/// Replace the session's upload. A failed read drops the previous upload.
#[instrument(level = "info", skip(state, data_base64), fields(%session_id, %name, %mime, encoded_len = data_base64.len()))]
pub async fn upload_file(
  state: &AppState,
  session_id: &str,
  name: &str,
  mime: &str,
  data_base64: &str,
) -> Result<SessionOut, AppError> {
  let extracted = extract_upload(name, mime, data_base64);
  state
    .with_session(session_id, |s| {
      s.error.clear();
      match extracted {
        Ok(upload) => {
          info!(target: "flashcards", session = %s.id, kind = ?upload.content.kind(), content_len = upload.content.len(), "Upload attached");
          s.upload = Some(upload);
          Ok(to_out(s))
        }
        Err(e) => {
          error!(target: "flashcards", session = %s.id, error = %e, "Upload read failed");
          s.upload = None;
          s.error = e.user_message();
          Err(e)
        }
      }
    })
    .await?
}

/// Validate, dispatch one generation, and replace the deck on success.
///
/// The session lock is released while the model call is in flight; the
/// `generating` flag stands in for it and rejects a second generation.
/// The call itself runs on its own task so the flag is always cleared,
/// even when the request that started it is dropped.
#[instrument(level = "info", skip(state, topic), fields(%session_id, topic_len = topic.len(), ?card_count))]
pub async fn generate(
  state: &AppState,
  session_id: &str,
  topic: &str,
  card_count: Option<i64>,
) -> Result<SessionOut, AppError> {
  let count = clamp_card_count(card_count);

  let req = state
    .with_session(session_id, |s| {
      if s.generating {
        warn!(target: "flashcards", session = %s.id, "Generation already in flight");
        return Err(AppError::Busy);
      }
      match build_request(topic, count, s.upload.as_ref(), &state.config) {
        Ok(req) => {
          s.generating = true;
          s.error.clear();
          Ok(req)
        }
        Err(e) => {
          s.error = e.user_message();
          Err(e)
        }
      }
    })
    .await??;

  info!(target: "flashcards", %session_id, count, "Generating flashcards");

  // Dispatch and completion run detached: if the caller goes away (client
  // disconnect drops the handler future) the flag is still cleared.
  let task_state = state.clone();
  let task_session = session_id.to_string();
  let task = tokio::spawn(async move {
    let result = task_state.anthropic.generate_flashcards(&req).await;
    finish_generation(&task_state, &task_session, result.map_err(AppError::from)).await
  }.in_current_span());

  match task.await {
    Ok(out) => out,
    Err(e) => {
      error!(target: "flashcards", %session_id, error = %e, "Generation task aborted");
      let err = AppError::Internal(e.to_string());
      finish_generation(state, session_id, Err(err)).await
    }
  }
}

/// Clear the generating flag and apply the outcome to the session.
async fn finish_generation(
  state: &AppState,
  session_id: &str,
  result: Result<Vec<Flashcard>, AppError>,
) -> Result<SessionOut, AppError> {
  state
    .with_session(session_id, |s| {
      s.generating = false;
      match result {
        Ok(cards) => {
          s.deck.replace(cards);
          if s.deck.is_empty() {
            warn!(target: "flashcards", session = %s.id, "Model returned an empty flashcard array");
          }
          info!(target: "flashcards", session = %s.id, cards = s.deck.len(), "Deck replaced");
          Ok(to_out(s))
        }
        Err(e) => {
          s.error = e.user_message();
          Err(e)
        }
      }
    })
    .await?
}

#[instrument(level = "info", skip(state), fields(%session_id, index))]
pub async fn toggle_flip(state: &AppState, session_id: &str, index: usize) -> Result<SessionOut, AppError> {
  state
    .with_session(session_id, |s| -> Result<SessionOut, AppError> {
      let flipped = s.deck.toggle_flip(index)?;
      info!(target: "flashcards", session = %s.id, index, flipped, "Card flipped");
      Ok(to_out(s))
    })
    .await?
}

#[instrument(level = "info", skip(state), fields(%session_id, index))]
pub async fn delete_card(state: &AppState, session_id: &str, index: usize) -> Result<SessionOut, AppError> {
  state
    .with_session(session_id, |s| -> Result<SessionOut, AppError> {
      s.deck.delete(index)?;
      info!(target: "flashcards", session = %s.id, index, remaining = s.deck.len(), "Card deleted");
      Ok(to_out(s))
    })
    .await?
}
