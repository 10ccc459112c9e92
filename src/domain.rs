//! Domain models: flashcards, uploaded files and their extracted content.

use serde::{Deserialize, Serialize};

pub const MIN_CARDS: u32 = 1;
pub const MAX_CARDS: u32 = 20;
pub const DEFAULT_CARDS: u32 = 5;

pub const PDF_MIME: &str = "application/pdf";

/// One question/answer pair as returned by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
  pub front: String,
  pub back: String,
}

/// How an upload is handed to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
  /// Sent as a base64 `document` block.
  Pdf,
  /// Embedded into the prompt as (truncated) text.
  Text,
}

/// Content kept after an upload was read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractedContent {
  /// Standard base64 of the raw PDF bytes.
  PdfBase64(String),
  Text(String),
}

impl ExtractedContent {
  pub fn kind(&self) -> FileKind {
    match self {
      ExtractedContent::PdfBase64(_) => FileKind::Pdf,
      ExtractedContent::Text(_) => FileKind::Text,
    }
  }

  /// Empty text counts as "no content" when choosing the prompt shape.
  pub fn is_empty(&self) -> bool {
    match self {
      ExtractedContent::PdfBase64(s) | ExtractedContent::Text(s) => s.is_empty(),
    }
  }

  pub fn len(&self) -> usize {
    match self {
      ExtractedContent::PdfBase64(s) | ExtractedContent::Text(s) => s.len(),
    }
  }
}

/// The single file currently attached to a session.
#[derive(Clone, Debug)]
pub struct Upload {
  pub name: String,
  pub content: ExtractedContent,
}
