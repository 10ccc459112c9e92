//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::error::AppError;
use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage, SessionOut};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "flashcards_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "flashcards_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = handle_text(&txt, &state).await;

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e), "code": "INTERNAL" }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "flashcards_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "flashcards_backend", "WebSocket disconnected");
}

/// Parse one text frame and produce the reply.
pub async fn handle_text(txt: &str, state: &AppState) -> ServerWsMessage {
  match serde_json::from_str::<ClientWsMessage>(txt) {
    Ok(incoming) => {
      debug!(target: "flashcards_backend", kind = message_kind(&incoming), "WS received");
      handle_client_ws(incoming, state).await
    }
    Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e), code: "BAD_MESSAGE".into() },
  }
}

// Upload payloads can be megabytes of base64; never Debug-print messages.
fn message_kind(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::NewSession => "new_session",
    ClientWsMessage::Snapshot { .. } => "snapshot",
    ClientWsMessage::Upload { .. } => "upload",
    ClientWsMessage::Generate { .. } => "generate",
    ClientWsMessage::Flip { .. } => "flip",
    ClientWsMessage::Delete { .. } => "delete",
  }
}

fn reply(result: Result<SessionOut, AppError>) -> ServerWsMessage {
  match result {
    Ok(session) => ServerWsMessage::Session { session },
    Err(e) => ServerWsMessage::Error { message: e.user_message(), code: e.code().into() },
  }
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::NewSession => ServerWsMessage::Session { session: logic::new_session(state).await },

    ClientWsMessage::Snapshot { session_id } => reply(logic::snapshot(state, &session_id).await),

    ClientWsMessage::Upload { session_id, file } => reply(
      logic::upload_file(state, &session_id, &file.name, &file.mime, &file.data_base64).await,
    ),

    ClientWsMessage::Generate { session_id, input } => {
      let result = logic::generate(state, &session_id, &input.topic, input.card_count).await;
      info!(target: "flashcards", %session_id, ok = result.is_ok(), "WS generate handled");
      reply(result)
    }

    ClientWsMessage::Flip { session_id, index } => reply(logic::toggle_flip(state, &session_id, index).await),

    ClientWsMessage::Delete { session_id, index } => reply(logic::delete_card(state, &session_id, index).await),
  }
}
