//! Deterministic provider for tests and offline runs.
//!
//! Responses are matched by checking whether the prompt text contains a
//! registered substring (case-insensitive). Every call is counted, including
//! failing ones.

use crate::{GenerationRequest, LLMProvider, LLMResponse};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FakeProvider {
    /// Prompt substring -> response, checked in insertion order
    responses: Mutex<Vec<(String, String)>>,
    default_response: Option<String>,
    failure: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            default_response: Some("{}".to_string()),
            failure: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }
}

impl FakeProvider {
    /// A provider with no registered responses and no default.
    pub fn new() -> Self {
        Self {
            default_response: None,
            ..Self::default()
        }
    }

    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let provider = Self::new();
        provider.add_response(prompt_contains, response);
        provider
    }

    /// A provider whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn add_response(&self, prompt_contains: &str, response: &str) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((prompt_contains.to_lowercase(), response.to_string()));
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Canned answers for every advisory prompt, keyed on each prompt's opening line.
    pub fn with_advisory_responses() -> Self {
        let provider = Self::new();

        provider.add_response(
            "diagnosing crop diseases",
            r#"{"disease": "Leaf rust (Puccinia triticina)", "confidence": 0.87, "recommendations": "Remove infected leaves and apply a triazole fungicide at first sign of pustules. Rotate with non-host crops next season."}"#,
        );
        provider.add_response(
            "market prices for their crops",
            r#"{"marketPrice": "₹2,275 per quintal", "speech": "Ajj kanak da bhaa 2,275 rupaye prati quintal hai."}"#,
        );
        provider.add_response(
            "sustainable agriculture practices",
            r#"{"suggestions": "1. Switch to drip irrigation for cotton.\n2. Mulch with crop residue instead of burning.\n3. Add a legume cover crop after harvest."}"#,
        );
        provider.add_response(
            "government financial support schemes",
            r#"{"eligibleSchemes": "PM-KISAN income support; Kisan Credit Card", "suggestedSchemes": "PM Fasal Bima Yojana crop insurance; Agriculture Infrastructure Fund"}"#,
        );

        provider
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request this provider received.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LLMProvider for FakeProvider {
    async fn generate_structured(&self, request: GenerationRequest) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.prompt_text().to_lowercase();
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request);

        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }

        let matched = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, response)| response.clone());

        match matched.or_else(|| self.default_response.clone()) {
            Some(response) => Ok(LLMResponse::single(response)),
            None => {
                let preview: String = prompt.chars().take(100).collect();
                anyhow::bail!(
                    "FakeProvider: No response configured for prompt (first 100 chars): {}",
                    preview
                )
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_provider_matching() {
        let provider = FakeProvider::with_response("hello", "world");
        let result = provider.generate("Say hello to the user").await.unwrap();
        assert_eq!(result.content(), "world");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fake_provider_case_insensitive() {
        let provider = FakeProvider::with_response("HELLO", "world");
        let result = provider.generate("hello there").await.unwrap();
        assert_eq!(result.content(), "world");
    }

    #[tokio::test]
    async fn test_fake_provider_no_match() {
        let provider = FakeProvider::new();
        assert!(provider.generate("random prompt").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_provider_counts_calls() {
        let provider = FakeProvider::failing("upstream unavailable");
        let err = provider.generate("anything").await.unwrap_err();
        assert!(err.to_string().contains("upstream unavailable"));
        assert_eq!(provider.call_count(), 1);
        assert!(provider.last_request().is_some());
    }
}
