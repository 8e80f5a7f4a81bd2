//! Generative-model providers behind one async trait.

mod fake;
mod gemini;
mod openai;

pub use fake::FakeProvider;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One piece of a message: plain text, or an inline base64 media blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    Media { mime_type: String, data: String },
}

impl Part {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::Media { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenation of the text parts, media omitted.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A prompt plus the JSON schema the answer is expected to follow.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub output_schema: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            output_schema: None,
        }
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// All text parts of all messages, in order.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Candidate texts in the order the provider returned them.
    pub candidates: Vec<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl LLMResponse {
    pub fn single(content: impl Into<String>) -> Self {
        Self {
            candidates: vec![content.into()],
            finish_reason: None,
            usage: None,
        }
    }

    pub fn content(&self) -> &str {
        self.candidates.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Override for the provider endpoint root, e.g. a local proxy.
    pub base_url: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: 0.4,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAI,
    Fake,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Fake => "fake",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAI),
            "fake" => Ok(ProviderKind::Fake),
            other => anyhow::bail!("Unknown provider: {}", other),
        }
    }
}

/// A hosted (or fake) generative model.
///
/// Implementations make exactly one outbound call per method invocation and
/// never retry; failures propagate to the caller unchanged.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Plain text in, plain text out.
    async fn generate(&self, prompt: &str) -> Result<LLMResponse> {
        let request = GenerationRequest::new(vec![Message::user(vec![Part::Text(
            prompt.to_string(),
        )])]);
        self.generate_structured(request).await
    }

    /// Multi-part messages in, candidate texts out. When the request declares
    /// an output schema the provider is asked to answer with matching JSON.
    async fn generate_structured(&self, request: GenerationRequest) -> Result<LLMResponse>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Build a provider from a resolved kind and config.
pub fn create_provider(kind: ProviderKind, config: LLMConfig) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match kind {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config)?),
        ProviderKind::OpenAI => Arc::new(OpenAIClient::new(config)?),
        ProviderKind::Fake => Arc::new(FakeProvider::with_advisory_responses()),
    };
    Ok(provider)
}

/// Remove a surrounding markdown code fence, if any.
///
/// The opening fence's info string (`json`, `JSON`, ...) runs to the first newline.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_code_fences_with_any_language_tag() {
        assert_eq!(strip_code_fences("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(
            strip_code_fences("```javascript \r\n{\"a\":1}\r\n```\n"),
            "{\"a\":1}"
        );
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_message_text_skips_media() {
        let message = Message::user(vec![
            Part::Text("Photo: ".to_string()),
            Part::Media {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            },
            Part::Text("\nDone".to_string()),
        ]);
        assert_eq!(message.text(), "Photo: \nDone");
    }
}
