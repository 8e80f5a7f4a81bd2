use async_trait::async_trait;
use saksham_llm::{strip_code_fences, GenerationRequest, LLMProvider, Message};
use saksham_prompt::{ObjectSchema, PromptTemplate, PromptValues, SchemaViolation, TemplateError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    #[error("flow '{flow}': invalid input: {}", join_violations(.violations))]
    InvalidInput {
        flow: &'static str,
        violations: Vec<SchemaViolation>,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("flow '{flow}': provider call failed: {error}")]
    Provider {
        flow: &'static str,
        error: anyhow::Error,
    },

    #[error("flow '{flow}': no candidate conformed to the output schema ({})", .details.join("; "))]
    NonConforming {
        flow: &'static str,
        details: Vec<String>,
    },

    #[error("failed to encode flow output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unknown flow '{0}'")]
    UnknownFlow(String),
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A record with a declared field shape.
pub trait Schema {
    fn schema() -> ObjectSchema;
}

/// A request record that can be substituted into a prompt template.
pub trait PromptInput: Schema {
    fn prompt_values(&self) -> PromptValues;
}

/// A stateless operation from one request to one response or one failure.
#[async_trait]
pub trait Flow: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    async fn run(&self, input: Self::Input) -> Result<Self::Output, FlowError>;
}

/// The generic structured prompt executor every advisory flow is built from:
/// a template, an input schema, an output schema and a provider.
pub struct StructuredPrompt<I, O> {
    name: &'static str,
    template: PromptTemplate,
    llm: Arc<dyn LLMProvider>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> StructuredPrompt<I, O>
where
    I: PromptInput + Serialize + Send + Sync + 'static,
    O: Schema + DeserializeOwned + Send + 'static,
{
    pub fn new(
        name: &'static str,
        template: &str,
        llm: Arc<dyn LLMProvider>,
    ) -> Result<Self, FlowError> {
        let template = PromptTemplate::parse(name, template)?;
        Ok(Self {
            name,
            template,
            llm,
            _marker: PhantomData,
        })
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    fn check_input(&self, input: &I) -> Result<(), FlowError> {
        let value = serde_json::to_value(input).map_err(|e| FlowError::InvalidInput {
            flow: self.name,
            violations: vec![SchemaViolation {
                field: "$".to_string(),
                message: e.to_string(),
            }],
        })?;
        I::schema()
            .validate(&value)
            .map_err(|violations| FlowError::InvalidInput {
                flow: self.name,
                violations,
            })
    }

    /// Parse one candidate text into the output record.
    fn accept_candidate(schema: &ObjectSchema, raw: &str) -> Result<O, String> {
        let value: serde_json::Value =
            serde_json::from_str(strip_code_fences(raw)).map_err(|e| format!("not JSON: {}", e))?;
        schema
            .validate(&value)
            .map_err(|violations| join_violations(&violations))?;
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    /// Render, call the provider once, and return the first conforming candidate.
    pub async fn execute(&self, input: &I) -> Result<O, FlowError> {
        self.check_input(input)?;

        let parts = self.template.render(&input.prompt_values())?;
        let output_schema = O::schema();
        let request = GenerationRequest::new(vec![Message::user(parts)])
            .with_output_schema(output_schema.to_json_schema());

        info!("🌾 Running flow '{}' with {}", self.name, self.llm.provider_name());
        let start = Instant::now();
        let response = self
            .llm
            .generate_structured(request)
            .await
            .map_err(|error| FlowError::Provider {
                flow: self.name,
                error,
            })?;
        debug!(
            "Flow '{}' got {} candidate(s) in {:?}",
            self.name,
            response.candidates.len(),
            start.elapsed()
        );

        let mut details = Vec::new();
        for (i, candidate) in response.candidates.iter().enumerate() {
            match Self::accept_candidate(&output_schema, candidate) {
                Ok(output) => {
                    info!("✅ Flow '{}' finished in {:?}", self.name, start.elapsed());
                    return Ok(output);
                }
                Err(reason) => {
                    warn!("Flow '{}' rejected candidate {}: {}", self.name, i, reason);
                    details.push(format!("candidate {}: {}", i, reason));
                }
            }
        }

        if details.is_empty() {
            details.push("provider returned no candidates".to_string());
        }
        Err(FlowError::NonConforming {
            flow: self.name,
            details,
        })
    }
}

#[async_trait]
impl<I, O> Flow for StructuredPrompt<I, O>
where
    I: PromptInput + Serialize + Send + Sync + 'static,
    O: Schema + DeserializeOwned + Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, input: I) -> Result<O, FlowError> {
        self.execute(&input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saksham_llm::{FakeProvider, LLMResponse, Part};
    use saksham_prompt::{FieldSpec, PromptValue};
    use serde::Deserialize;

    #[derive(Serialize)]
    struct Echo {
        word: String,
    }

    impl Schema for Echo {
        fn schema() -> ObjectSchema {
            ObjectSchema::new(vec![FieldSpec::string("word", "A word")])
        }
    }

    impl PromptInput for Echo {
        fn prompt_values(&self) -> PromptValues {
            let mut values = PromptValues::new();
            values.insert("word", PromptValue::Text(self.word.clone()));
            values
        }
    }

    #[derive(Debug, Deserialize)]
    struct Score {
        score: f64,
    }

    impl Schema for Score {
        fn schema() -> ObjectSchema {
            ObjectSchema::new(vec![FieldSpec::number("score", "A score").range(0.0, 1.0)])
        }
    }

    /// Returns a fixed list of candidates.
    struct Candidates(Vec<&'static str>);

    #[async_trait]
    impl LLMProvider for Candidates {
        async fn generate_structured(
            &self,
            _request: GenerationRequest,
        ) -> anyhow::Result<LLMResponse> {
            Ok(LLMResponse {
                candidates: self.0.iter().map(|c| c.to_string()).collect(),
                finish_reason: None,
                usage: None,
            })
        }

        fn provider_name(&self) -> &'static str {
            "candidates"
        }

        fn model_name(&self) -> &str {
            "candidates"
        }
    }

    fn echo_flow(llm: Arc<dyn LLMProvider>) -> StructuredPrompt<Echo, Score> {
        StructuredPrompt::new("echo", "Score the word {{{word}}}.", llm).unwrap()
    }

    #[tokio::test]
    async fn test_sends_rendered_prompt_and_schema() {
        let fake = Arc::new(FakeProvider::with_response("score the word", r#"{"score": 0.5}"#));
        let flow = echo_flow(fake.clone());

        let out = flow.run(Echo { word: "millet".to_string() }).await.unwrap();
        assert_eq!(out.score, 0.5);

        let request = fake.last_request().unwrap();
        assert_eq!(
            request.messages[0].parts,
            vec![Part::Text("Score the word millet.".to_string())]
        );
        let schema = request.output_schema.unwrap();
        assert_eq!(schema["required"], serde_json::json!(["score"]));
    }

    #[tokio::test]
    async fn test_returns_first_conforming_candidate() {
        let flow = echo_flow(Arc::new(Candidates(vec![
            "I think it is high",
            r#"{"score": 7}"#,
            "```json\n{\"score\": 0.25}\n```",
            r#"{"score": 0.75}"#,
        ])));
        let out = flow.run(Echo { word: "ragi".to_string() }).await.unwrap();
        assert_eq!(out.score, 0.25);
    }

    #[tokio::test]
    async fn test_no_conforming_candidate_fails() {
        let flow = echo_flow(Arc::new(Candidates(vec![r#"{"score": 1.5}"#])));
        let err = flow.run(Echo { word: "jowar".to_string() }).await.unwrap_err();
        match err {
            FlowError::NonConforming { flow, details } => {
                assert_eq!(flow, "echo");
                assert_eq!(details.len(), 1);
                assert!(details[0].contains("score"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_without_retry() {
        let fake = Arc::new(FakeProvider::failing("connection reset"));
        let flow = echo_flow(fake.clone());
        let err = flow.run(Echo { word: "bajra".to_string() }).await.unwrap_err();
        assert!(matches!(err, FlowError::Provider { .. }));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(fake.call_count(), 1);
    }

    #[test]
    fn test_bad_template_fails_construction() {
        let result: Result<StructuredPrompt<Echo, Score>, _> =
            StructuredPrompt::new("broken", "{{{word}}", Arc::new(FakeProvider::new()));
        assert!(matches!(result, Err(FlowError::Template(_))));
    }
}
