//! Loading service configuration (LLM settings + prompts) from TOML and env.
//!
//! Resolution order: built-in defaults, then the TOML file named by
//! FLASHCARDS_CONFIG_PATH (if any), then individual environment variables.
//!
//! Example TOML:
//! ```toml
//! max_upload_bytes = 10485760
//! session_ttl_secs = 3600
//!
//! [llm]
//! model = "claude-sonnet-4-20250514"
//! max_tokens = 2000
//! timeout_secs = 60
//!
//! [prompts]
//! topic_instruction = "Generate {count} flashcards about \"{topic}\". ..."
//! ```

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_DOCUMENT_CHAR_BUDGET: usize = 15_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub llm: LlmSettings,
  pub prompts: Prompts,
  /// Request body limit; uploads arrive base64-encoded inside JSON.
  pub max_upload_bytes: usize,
  /// How many characters of a text upload are embedded in the prompt.
  pub document_char_budget: usize,
  /// Idle sessions older than this are dropped on the next session create.
  pub session_ttl_secs: u64,
  /// Least recently used sessions are evicted beyond this count.
  pub max_sessions: usize,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      llm: LlmSettings::default(),
      prompts: Prompts::default(),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
      document_char_budget: DEFAULT_DOCUMENT_CHAR_BUDGET,
      session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
      max_sessions: DEFAULT_MAX_SESSIONS,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
  pub base_url: String,
  /// Never read from TOML, only from ANTHROPIC_API_KEY.
  #[serde(skip)]
  pub api_key: Option<String>,
  pub model: String,
  pub max_tokens: u32,
  pub anthropic_version: String,
  /// No timeout when unset.
  pub timeout_secs: Option<u64>,
}

impl Default for LlmSettings {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.into(),
      api_key: None,
      model: DEFAULT_MODEL.into(),
      max_tokens: DEFAULT_MAX_TOKENS,
      anthropic_version: DEFAULT_ANTHROPIC_VERSION.into(),
      timeout_secs: None,
    }
  }
}

/// Instruction templates. Placeholders: `{count}`, `{topic}`, `{document}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Sent as a text block after the PDF document block.
  pub pdf_instruction: String,
  /// Plain-string content for text/markdown uploads.
  pub document_instruction: String,
  /// Plain-string content when only a topic is given.
  pub topic_instruction: String,
}

const JSON_ONLY_SUFFIX: &str = "Return ONLY a JSON array with no preamble or markdown formatting. Each flashcard should have \"front\" (question) and \"back\" (answer) fields. Format: [{\"front\":\"question\",\"back\":\"answer\"}]";

impl Default for Prompts {
  fn default() -> Self {
    Self {
      pdf_instruction: format!(
        "Read this PDF document carefully and generate {{count}} flashcards based on the key concepts, facts, and information contained in it. {JSON_ONLY_SUFFIX}"
      ),
      document_instruction: format!(
        "Based on this document content, generate {{count}} flashcards covering the main topics and concepts. {JSON_ONLY_SUFFIX}\n\nDocument:\n{{document}}"
      ),
      topic_instruction: format!("Generate {{count}} flashcards about \"{{topic}}\". {JSON_ONLY_SUFFIX}"),
    }
  }
}

impl AppConfig {
  /// Defaults + optional TOML file + env overrides. Never fails: a broken
  /// config file is logged and ignored.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    cfg.apply_env(|k| std::env::var(k).ok());
    cfg
  }

  /// Apply ANTHROPIC_* overrides through `lookup`.
  pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
      self.llm.api_key = Some(key);
    }
    if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
      self.llm.base_url = url;
    }
    if let Some(model) = lookup("ANTHROPIC_MODEL") {
      self.llm.model = model;
    }
    self.llm.base_url = self.llm.base_url.trim_end_matches('/').to_string();
  }
}

/// Attempt to load `AppConfig` from FLASHCARDS_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("FLASHCARDS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "flashcards_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "flashcards_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "flashcards_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AppConfig = toml::from_str("[llm]\nmax_tokens = 500\n").expect("toml");
    assert_eq!(cfg.llm.max_tokens, 500);
    assert_eq!(cfg.llm.model, DEFAULT_MODEL);
    assert_eq!(cfg.document_char_budget, DEFAULT_DOCUMENT_CHAR_BUDGET);
    assert_eq!(cfg.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
    assert_eq!(cfg.max_sessions, DEFAULT_MAX_SESSIONS);
    assert!(cfg.prompts.topic_instruction.contains("{topic}"));
  }

  #[test]
  fn env_overrides_win_and_blank_key_is_ignored() {
    let mut cfg = AppConfig::default();
    cfg.apply_env(|k| match k {
      "ANTHROPIC_BASE_URL" => Some("http://127.0.0.1:9999/".into()),
      "ANTHROPIC_API_KEY" => Some("  ".into()),
      _ => None,
    });
    assert_eq!(cfg.llm.base_url, "http://127.0.0.1:9999");
    assert!(cfg.llm.api_key.is_none());
  }

  #[test]
  fn default_prompts_demand_a_bare_json_array() {
    let p = Prompts::default();
    for tpl in [&p.pdf_instruction, &p.document_instruction, &p.topic_instruction] {
      assert!(tpl.contains("{count}"));
      assert!(tpl.contains(r#"Format: [{"front":"question","back":"answer"}]"#));
    }
    assert!(p.document_instruction.ends_with("\n\nDocument:\n{document}"));
  }
}
