use super::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            anyhow::bail!("OpenAI API key is required");
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.api_key,
            model: config.model,
            temperature: config.temperature,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn build_request_body(&self, request: &GenerationRequest) -> Result<Value> {
        let mut openai_messages: Vec<Value> = Vec::new();

        if let Some(schema) = &request.output_schema {
            openai_messages.push(json!({
                "role": "system",
                "content": format!(
                    "Respond with a single JSON object only, matching this JSON schema:\n{}",
                    schema
                ),
            }));
        }

        for msg in &request.messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let content = msg
                .parts
                .iter()
                .map(content_part)
                .collect::<Result<Vec<Value>>>()?;
            openai_messages.push(json!({
                "role": role,
                "content": content,
            }));
        }

        let mut body = json!({
            "model": self.model,
            "messages": openai_messages,
            "temperature": self.temperature,
            "max_tokens": 4096,
        });
        if request.output_schema.is_some() {
            body["response_format"] = json!({ "type": "json_object" });
        }
        Ok(body)
    }
}

/// Chat completions only take images as media. Text and JSON attachments are
/// decoded and sent inline.
fn content_part(part: &Part) -> Result<Value> {
    match part {
        Part::Text(text) => Ok(json!({ "type": "text", "text": text })),
        Part::Media { mime_type, data } if mime_type.starts_with("image/") => Ok(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:{};base64,{}", mime_type, data) },
        })),
        Part::Media { mime_type, data } if is_textual(mime_type) => {
            let bytes = STANDARD
                .decode(data)
                .with_context(|| format!("{} attachment is not valid base64", mime_type))?;
            let text = String::from_utf8(bytes)
                .with_context(|| format!("{} attachment is not UTF-8 text", mime_type))?;
            Ok(json!({
                "type": "text",
                "text": format!("[{} attachment]\n{}", mime_type, text),
            }))
        }
        Part::Media { mime_type, .. } => anyhow::bail!(
            "OpenAI cannot take {} attachments; send an image, text or JSON file",
            mime_type
        ),
    }
}

fn is_textual(mime_type: &str) -> bool {
    mime_type.starts_with("text/") || mime_type == "application/json" || mime_type.ends_with("+json")
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn generate_structured(&self, request: GenerationRequest) -> Result<LLMResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("Calling OpenAI API with model: {}", self.model);

        let body = self.build_request_body(&request)?;

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let json: Value = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        let candidates: Vec<String> = json["choices"]
            .as_array()
            .map(|choices| {
                choices
                    .iter()
                    .filter_map(|c| c["message"]["content"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if candidates.is_empty() {
            anyhow::bail!("OpenAI response contained no message content");
        }

        let usage = json["usage"].as_object().map(|u| Usage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as usize,
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0) as usize,
        });

        info!("OpenAI returned {} candidate(s)", candidates.len());

        Ok(LLMResponse {
            candidates,
            finish_reason: json["choices"][0]["finish_reason"]
                .as_str()
                .map(|s| s.to_string()),
            usage,
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_requests_json_object() {
        let client = OpenAIClient::new(LLMConfig {
            api_key: "sk-test".to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            ..Default::default()
        })
        .unwrap();

        let request = GenerationRequest::new(vec![Message::user(vec![
            Part::Text("Photo:".to_string()),
            Part::Media {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            },
        ])])
        .with_output_schema(json!({ "type": "object" }));

        let body = client.build_request_body(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    fn client() -> OpenAIClient {
        OpenAIClient::new(LLMConfig {
            api_key: "sk-test".to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn media(mime_type: &str, data: &str) -> GenerationRequest {
        GenerationRequest::new(vec![Message::user(vec![
            Part::Text("Environmental Data:".to_string()),
            Part::Media {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            },
        ])])
    }

    #[test]
    fn test_text_attachments_are_inlined() {
        // "a,b\n1,2"
        let body = client().build_request_body(&media("text/csv", "YSxiCjEsMg==")).unwrap();
        let part = &body["messages"][0]["content"][1];
        assert_eq!(part["type"], "text");
        assert_eq!(part["text"], "[text/csv attachment]\na,b\n1,2");
        assert!(part.get("image_url").is_none());

        // {"ph":6.5}
        let body = client()
            .build_request_body(&media("application/json", "eyJwaCI6Ni41fQ=="))
            .unwrap();
        assert_eq!(
            body["messages"][0]["content"][1]["text"],
            "[application/json attachment]\n{\"ph\":6.5}"
        );
    }

    #[test]
    fn test_unsupported_attachment_is_an_error() {
        let err = client()
            .build_request_body(&media("application/pdf", "JVBERg=="))
            .unwrap_err();
        assert!(err.to_string().contains("application/pdf"), "got: {err}");
    }
}
