//! Minimal Anthropic Messages API client for flashcard generation.
//!
//! One POST per generation, no retries. The model is asked for a bare JSON
//! array; we still strip ```json fences because models do not always obey.
//! Calls are instrumented and log model names, latencies, and response sizes
//! (not contents).
//!
//! NOTE: We never log the API key or document text.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::config::LlmSettings;
use crate::domain::Flashcard;
use crate::error::LlmError;
use crate::prompt::MessagesRequest;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct Anthropic {
  pub client: reqwest::Client,
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub anthropic_version: String,
}

impl Anthropic {
  pub fn new(settings: &LlmSettings) -> Result<Self, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = settings.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build()?;
    Ok(Self {
      client,
      api_key: settings.api_key.clone(),
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      anthropic_version: settings.anthropic_version.clone(),
    })
  }

  pub fn messages_url(&self) -> String {
    format!("{}/v1/messages", self.base_url)
  }

  /// Send one Messages request and return the first text block.
  #[instrument(level = "info", skip(self, req), fields(model = %req.model, max_tokens = req.max_tokens))]
  pub async fn complete_text(&self, req: &MessagesRequest) -> Result<String, LlmError> {
    let mut builder = self.client.post(self.messages_url())
      .header(USER_AGENT, "flashcards-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("anthropic-version", &self.anthropic_version);
    if let Some(key) = &self.api_key {
      builder = builder.header("x-api-key", key);
    }

    let res = builder.json(req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(LlmError::Status { status: status.as_u16(), message });
    }

    let body = res.text().await?;
    let parsed: MessagesResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Decode(e.to_string()))?;
    if let Some(usage) = &parsed.usage {
      info!(input_tokens = ?usage.input_tokens, output_tokens = ?usage.output_tokens, stop_reason = ?parsed.stop_reason, "Anthropic usage");
    }
    first_text(&parsed).map(str::to_string).ok_or(LlmError::NoText)
  }

  /// Full round trip: request, fence stripping, JSON array parsing.
  #[instrument(level = "info", skip(self, req), fields(model = %req.model))]
  pub async fn generate_flashcards(&self, req: &MessagesRequest) -> Result<Vec<Flashcard>, LlmError> {
    let start = Instant::now();
    let result = match self.complete_text(req).await {
      Ok(text) => parse_flashcards(&text),
      Err(e) => Err(e),
    };
    let elapsed = start.elapsed();

    match &result {
      Ok(cards) => info!(?elapsed, cards = cards.len(), "Flashcards generated"),
      Err(e) => error!(?elapsed, error = %e, "Flashcard generation failed"),
    }
    result
  }
}

static RE_JSON_FENCE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"```json\n?|\n?```").unwrap());

/// Remove every ```json / ``` fence marker (with its adjacent newline) and trim.
pub fn strip_code_fences(text: &str) -> String {
  RE_JSON_FENCE.replace_all(text, "").trim().to_string()
}

/// Parse model text as a JSON array of `{front, back}` objects.
pub fn parse_flashcards(text: &str) -> Result<Vec<Flashcard>, LlmError> {
  let cleaned = strip_code_fences(text);
  Ok(serde_json::from_str(&cleaned)?)
}

// --- Messages API response DTOs ---

#[derive(Deserialize)]
struct MessagesResponse {
  content: Vec<ResponseBlock>,
  #[serde(default)] stop_reason: Option<String>,
  #[serde(default)] usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseBlock {
  #[serde(rename = "type")]
  block_type: String,
  #[serde(default)] text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
  #[serde(default)] input_tokens: Option<u32>,
  #[serde(default)] output_tokens: Option<u32>,
}

fn first_text(res: &MessagesResponse) -> Option<&str> {
  res.content.iter()
    .find(|b| b.block_type == "text")
    .and_then(|b| b.text.as_deref())
}

/// Try to extract a clean error message from an Anthropic error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
pub(crate) mod test_support {
  //! A local stand-in for the Messages endpoint.

  use std::sync::{Arc, Mutex};

  use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
  use serde_json::Value;
  use tokio::net::TcpListener;

  #[derive(Clone)]
  pub struct MockReply {
    pub status: StatusCode,
    pub body: Value,
  }

  #[derive(Clone)]
  struct MockState {
    reply: MockReply,
    seen: Arc<Mutex<Vec<Value>>>,
  }

  /// Running mock; `seen` collects every request body received.
  pub struct MockServer {
    pub base_url: String,
    pub seen: Arc<Mutex<Vec<Value>>>,
  }

  impl MockServer {
    pub fn requests(&self) -> Vec<Value> {
      self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
  }

  pub fn text_reply(text: &str) -> MockReply {
    MockReply {
      status: StatusCode::OK,
      body: serde_json::json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 12, "output_tokens": 34 }
      }),
    }
  }

  async fn messages(State(st): State<MockState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    st.seen.lock().expect("mock lock").push(body);
    (st.reply.status, Json(st.reply.body.clone()))
  }

  pub async fn spawn(reply: MockReply) -> MockServer {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
      .route("/v1/messages", post(messages))
      .with_state(MockState { reply, seen: seen.clone() });
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
      let _ = axum::serve(listener, app).await;
    });
    MockServer { base_url: format!("http://{addr}"), seen }
  }
}
