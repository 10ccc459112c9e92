//! Prompt builder: turns (topic, card count, upload) into one Messages API
//! request body.
//!
//! Three shapes, first match wins:
//! 1. PDF upload  -> `[document block, text block]`
//! 2. text upload -> plain string with the document embedded (truncated)
//! 3. topic only  -> plain string with the topic embedded

use serde::Serialize;

use crate::config::AppConfig;
use crate::domain::{ExtractedContent, Upload, PDF_MIME};
use crate::error::AppError;
use crate::util::{fill_template, truncate_chars};

#[derive(Clone, Debug, Serialize)]
pub struct MessagesRequest {
  pub model: String,
  pub max_tokens: u32,
  pub messages: Vec<Message>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Message {
  pub role: &'static str,
  pub content: MessageContent,
}

/// A user turn is either a bare string or a list of typed blocks.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
  Text(String),
  Blocks(Vec<ContentBlock>),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
  Document { source: DocumentSource },
  Text { text: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct DocumentSource {
  #[serde(rename = "type")]
  pub source_type: &'static str,
  pub media_type: &'static str,
  pub data: String,
}

impl MessagesRequest {
  /// Content of the single user turn.
  #[cfg(test)]
  pub fn user_content(&self) -> Option<&MessageContent> {
    self.messages.first().map(|m| &m.content)
  }
}

/// Build the request, or reject locally when there is nothing to ask about.
///
/// Upload content wins over the topic; empty upload content is treated as
/// absent. `card_count` is expected to be clamped already.
pub fn build_request(
  topic: &str,
  card_count: u32,
  upload: Option<&Upload>,
  cfg: &AppConfig,
) -> Result<MessagesRequest, AppError> {
  let content = upload.map(|u| &u.content).filter(|c| !c.is_empty());
  let count = card_count.to_string();

  let content = match content {
    Some(ExtractedContent::PdfBase64(data)) => MessageContent::Blocks(vec![
      ContentBlock::Document {
        source: DocumentSource { source_type: "base64", media_type: PDF_MIME, data: data.clone() },
      },
      ContentBlock::Text { text: fill_template(&cfg.prompts.pdf_instruction, &[("count", &count)]) },
    ]),
    Some(ExtractedContent::Text(text)) => {
      let document = truncate_chars(text, cfg.document_char_budget);
      MessageContent::Text(fill_template(
        &cfg.prompts.document_instruction,
        &[("count", &count), ("document", document)],
      ))
    }
    None if !topic.trim().is_empty() => MessageContent::Text(fill_template(
      &cfg.prompts.topic_instruction,
      &[("count", &count), ("topic", topic)],
    )),
    None => return Err(AppError::MissingInput),
  };

  Ok(MessagesRequest {
    model: cfg.llm.model.clone(),
    max_tokens: cfg.llm.max_tokens,
    messages: vec![Message { role: "user", content }],
  })
}
