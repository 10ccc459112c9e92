//! Error types.
//!
//! Internally every failure is typed so it can be logged with its cause and
//! mapped to an HTTP status. Externally the user only ever sees one of three
//! flat messages (missing input, file read, generation failure) plus a few
//! routing errors that the bundled page never triggers on its own.

use axum::{
  extract::rejection::PathRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

pub const MSG_MISSING_INPUT: &str = "Please enter a topic or upload a PDF";
pub const MSG_FILE_READ: &str = "Failed to read file. Please try again.";
pub const MSG_GENERATION_FAILED: &str = "Failed to generate flashcards. Please try again.";

/// Failures of one Messages API round trip. All of them fold into
/// [`AppError::GenerationFailed`].
#[derive(Debug, Error)]
pub enum LlmError {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("response body is not a Messages API response: {0}")]
  Decode(String),

  #[error("response has no text content block")]
  NoText,

  #[error("model text is not a JSON array of flashcards: {0}")]
  Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("no topic and no uploaded content")]
  MissingInput,

  #[error("could not read uploaded file: {0}")]
  FileRead(String),

  #[error("flashcard generation failed: {0}")]
  GenerationFailed(#[from] LlmError),

  #[error("a generation is already in progress for this session")]
  Busy,

  #[error("unknown session '{0}'")]
  SessionNotFound(String),

  #[error("card index {index} is out of range (deck has {len} cards)")]
  CardOutOfRange { index: usize, len: usize },

  #[error("malformed request path: {0}")]
  BadPath(String),

  #[error("configuration error: {0}")]
  Config(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<PathRejection> for AppError {
  fn from(rejection: PathRejection) -> Self {
    AppError::BadPath(rejection.body_text())
  }
}

impl AppError {
  /// Message shown to the user. Causes stay in the logs.
  pub fn user_message(&self) -> String {
    match self {
      AppError::MissingInput => MSG_MISSING_INPUT.into(),
      AppError::FileRead(_) => MSG_FILE_READ.into(),
      AppError::GenerationFailed(_) | AppError::Config(_) | AppError::Internal(_) => MSG_GENERATION_FAILED.into(),
      AppError::Busy => "Flashcards are already being generated. Please wait.".into(),
      AppError::SessionNotFound(_) => "Session expired. Please reload the page.".into(),
      AppError::CardOutOfRange { .. } => "That card no longer exists.".into(),
      AppError::BadPath(_) => "Invalid request.".into(),
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      AppError::MissingInput => "MISSING_INPUT",
      AppError::FileRead(_) => "FILE_READ",
      AppError::GenerationFailed(_) => "GENERATION_FAILED",
      AppError::Busy => "BUSY",
      AppError::SessionNotFound(_) => "SESSION_NOT_FOUND",
      AppError::CardOutOfRange { .. } => "CARD_NOT_FOUND",
      AppError::BadPath(_) => "BAD_PATH",
      AppError::Config(_) => "CONFIG",
      AppError::Internal(_) => "INTERNAL",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::MissingInput | AppError::FileRead(_) | AppError::BadPath(_) => StatusCode::BAD_REQUEST,
      AppError::SessionNotFound(_) | AppError::CardOutOfRange { .. } => StatusCode::NOT_FOUND,
      AppError::Busy => StatusCode::CONFLICT,
      AppError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
      AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: String,
  pub code: &'static str,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = ErrorOut { error: self.user_message(), code: self.code() };
    (self.status(), Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generation_detail_never_reaches_the_user() {
    let err = AppError::GenerationFailed(LlmError::Status { status: 529, message: "overloaded".into() });
    assert_eq!(err.user_message(), MSG_GENERATION_FAILED);
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    assert!(err.to_string().contains("overloaded"));
  }

  #[test]
  fn local_validation_is_a_bad_request() {
    assert_eq!(AppError::MissingInput.status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::MissingInput.user_message(), MSG_MISSING_INPUT);
    assert_eq!(AppError::FileRead("bad base64".into()).user_message(), MSG_FILE_READ);
  }
}
