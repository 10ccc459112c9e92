//! Content extraction for uploaded files.
//!
//! The browser sends the raw file bytes base64-encoded inside JSON. PDFs are
//! kept as base64 (they go to the model as a `document` block); everything
//! else is decoded as UTF-8 text, with invalid sequences replaced the way a
//! browser `FileReader.readAsText` would.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, instrument};

use crate::domain::{ExtractedContent, FileKind, Upload, PDF_MIME};
use crate::error::AppError;

impl FileKind {
  /// PDF if the MIME type says so, or if no MIME type was given and the
  /// name ends in `.pdf`. Everything else is read as text.
  pub fn detect(name: &str, mime: &str) -> Self {
    let mime = mime.trim();
    if mime.eq_ignore_ascii_case(PDF_MIME) {
      return FileKind::Pdf;
    }
    if mime.is_empty() && name.to_ascii_lowercase().ends_with(".pdf") {
      return FileKind::Pdf;
    }
    FileKind::Text
  }
}

/// Decode the transport encoding and extract content according to `kind`.
#[instrument(level = "debug", skip(data_base64), fields(%name, %mime, encoded_len = data_base64.len()))]
pub fn extract_upload(name: &str, mime: &str, data_base64: &str) -> Result<Upload, AppError> {
  let bytes = STANDARD
    .decode(data_base64.trim())
    .map_err(|e| AppError::FileRead(e.to_string()))?;
  let kind = FileKind::detect(name, mime);
  let content = extract_bytes(kind, &bytes);
  debug!(target: "flashcards", ?kind, bytes = bytes.len(), content_len = content.len(), "Upload extracted");
  Ok(Upload { name: name.to_string(), content })
}

pub fn extract_bytes(kind: FileKind, bytes: &[u8]) -> ExtractedContent {
  match kind {
    FileKind::Pdf => ExtractedContent::PdfBase64(STANDARD.encode(bytes)),
    FileKind::Text => ExtractedContent::Text(String::from_utf8_lossy(bytes).into_owned()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detect_prefers_mime_and_falls_back_to_extension() {
    assert_eq!(FileKind::detect("notes.txt", "application/pdf"), FileKind::Pdf);
    assert_eq!(FileKind::detect("Paper.PDF", ""), FileKind::Pdf);
    assert_eq!(FileKind::detect("paper.pdf", "text/plain"), FileKind::Text);
    assert_eq!(FileKind::detect("notes.md", "text/markdown"), FileKind::Text);
  }

  #[test]
  fn pdf_payload_is_the_file_base64() {
    let raw = b"%PDF-1.4\n\x00\xff binary";
    let upload = extract_upload("a.pdf", PDF_MIME, &STANDARD.encode(raw)).expect("extract");
    assert_eq!(upload.content, ExtractedContent::PdfBase64(STANDARD.encode(raw)));
    assert_eq!(upload.content.kind(), FileKind::Pdf);
  }

  #[test]
  fn text_is_kept_verbatim() {
    let text = "# Title\n\nSome *markdown* with ünïcode.\n";
    let upload = extract_upload("n.md", "text/markdown", &STANDARD.encode(text)).expect("extract");
    assert_eq!(upload.name, "n.md");
    assert_eq!(upload.content, ExtractedContent::Text(text.to_string()));
  }

  #[test]
  fn invalid_utf8_is_replaced_not_rejected() {
    let content = extract_bytes(FileKind::Text, b"ok \xff end");
    assert_eq!(content, ExtractedContent::Text("ok \u{FFFD} end".into()));
  }

  #[test]
  fn undecodable_transport_is_a_read_error() {
    let err = extract_upload("a.txt", "text/plain", "not base64!!").unwrap_err();
    assert!(matches!(err, AppError::FileRead(_)));
  }
}
