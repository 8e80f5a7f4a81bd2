use crate::{GenerationRequest, LLMConfig, LLMProvider, LLMResponse, Message, Part, Role, Usage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            anyhow::bail!("Gemini API key is required");
        }

        Ok(Self {
            api_key: config.api_key,
            model: config.model,
            temperature: config.temperature,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;

        Self::new(LLMConfig {
            api_key,
            ..Default::default()
        })
    }

    fn build_request_body(&self, request: &GenerationRequest) -> Value {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => system_parts.extend(message.parts.iter().map(part_to_json)),
                Role::User | Role::Assistant => {
                    let role = if message.role == Role::User { "user" } else { "model" };
                    contents.push(json!({
                        "role": role,
                        "parts": message.parts.iter().map(part_to_json).collect::<Vec<_>>(),
                    }));
                }
            }
        }

        let mut generation_config = json!({
            "temperature": self.temperature,
            "topK": 40,
            "topP": 0.95,
        });
        if let Some(schema) = &request.output_schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = to_gemini_schema(schema);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": system_parts });
        }
        body
    }

    async fn call_api(&self, request: &GenerationRequest) -> Result<LLMResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );

        debug!("Calling Gemini API with model: {}", self.model);
        let body = self.build_request_body(request);

        let start_time = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let response_json: Value = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        info!("Gemini API call finished (took {:?})", start_time.elapsed());
        parse_response(&response_json)
    }
}

fn part_to_json(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::Media { mime_type, data } => json!({
            "inline_data": {
                "mime_type": mime_type,
                "data": data,
            }
        }),
    }
}

/// Gemini expects OpenAPI-style upper-case type names.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                let converted = match (key.as_str(), value) {
                    ("type", Value::String(t)) => Value::String(t.to_ascii_uppercase()),
                    ("properties", Value::Object(props)) => Value::Object(
                        props
                            .iter()
                            .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                            .collect(),
                    ),
                    ("items", item) => to_gemini_schema(item),
                    _ => value.clone(),
                };
                out.insert(key.clone(), converted);
            }
            // Gemini otherwise generates properties in alphabetical order.
            if let Some(Value::Object(props)) = map.get("properties") {
                let ordering = props.keys().cloned().map(Value::String).collect();
                out.insert("propertyOrdering".to_string(), Value::Array(ordering));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn parse_response(response_json: &Value) -> Result<LLMResponse> {
    let candidates = response_json["candidates"].as_array().with_context(|| {
        let reason = response_json["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates");
        format!("Gemini returned no candidates ({})", reason)
    })?;

    let texts: Vec<String> = candidates
        .iter()
        .filter_map(|candidate| {
            let parts = candidate["content"]["parts"].as_array()?;
            let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
            (!text.is_empty()).then_some(text)
        })
        .collect();

    if texts.is_empty() {
        anyhow::bail!("Failed to extract text from Gemini response");
    }

    let usage = response_json["usageMetadata"].as_object().map(|u| Usage {
        prompt_tokens: u.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as usize,
        completion_tokens: u
            .get("candidatesTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        total_tokens: u.get("totalTokenCount").and_then(Value::as_u64).unwrap_or(0) as usize,
    });

    Ok(LLMResponse {
        candidates: texts,
        finish_reason: candidates[0]["finishReason"].as_str().map(str::to_string),
        usage,
    })
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn generate_structured(&self, request: GenerationRequest) -> Result<LLMResponse> {
        info!(
            "Generating response with Gemini ({} message(s), schema: {})",
            request.messages.len(),
            request.output_schema.is_some()
        );
        self.call_api(&request).await
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
