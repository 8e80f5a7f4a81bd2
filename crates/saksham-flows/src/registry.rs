use crate::{
    crop_disease_diagnosis_flow, financial_scheme_flow, market_price_flow,
    sustainable_practice_flow, CropDiseaseDiagnosisFlow, DiagnoseCropDiseaseInput,
    DiagnoseCropDiseaseOutput, FinancialSchemeFlow, FlowError, GetFinancialSchemeAdvisoryInput,
    GetFinancialSchemeAdvisoryOutput, GetMarketPriceInput, GetMarketPriceOutput, MarketPriceFlow,
    Schema, SustainablePracticeFlow, SustainablePracticeInput, SustainablePracticeOutput,
};
use saksham_llm::LLMProvider;
use saksham_prompt::{ObjectSchema, SchemaViolation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Public description of a registered flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowDescriptor {
    pub key: &'static str,
    pub description: &'static str,
    pub input: ObjectSchema,
    pub output: ObjectSchema,
}

/// Every advisory flow, built once over a shared provider.
///
/// The flows hold no mutable state; invocations are independent.
#[derive(Clone)]
pub struct AdvisoryFlows {
    pub diagnosis: Arc<CropDiseaseDiagnosisFlow>,
    pub market_price: Arc<MarketPriceFlow>,
    pub conservation: Arc<SustainablePracticeFlow>,
    pub financial: Arc<FinancialSchemeFlow>,
}

impl AdvisoryFlows {
    pub const DIAGNOSIS: &'static str = "crop-disease-diagnosis";
    pub const MARKET_PRICE: &'static str = "market-price";
    pub const CONSERVATION: &'static str = "sustainable-practices";
    pub const FINANCIAL: &'static str = "financial-scheme-advisory";

    pub fn new(llm: Arc<dyn LLMProvider>) -> Result<Self, FlowError> {
        let flows = Self {
            diagnosis: Arc::new(crop_disease_diagnosis_flow(llm.clone())?),
            market_price: Arc::new(market_price_flow(llm.clone())?),
            conservation: Arc::new(sustainable_practice_flow(llm.clone())?),
            financial: Arc::new(financial_scheme_flow(llm.clone())?),
        };
        info!(
            "📋 Registered {} advisory flows on {} ({})",
            Self::descriptors().len(),
            llm.provider_name(),
            llm.model_name()
        );
        Ok(flows)
    }

    pub fn descriptors() -> Vec<FlowDescriptor> {
        vec![
            FlowDescriptor {
                key: Self::DIAGNOSIS,
                description: "Diagnose plant diseases or pest infestations from a crop photo",
                input: DiagnoseCropDiseaseInput::schema(),
                output: DiagnoseCropDiseaseOutput::schema(),
            },
            FlowDescriptor {
                key: Self::MARKET_PRICE,
                description: "Latest market price for a crop in the farmer's local dialect",
                input: GetMarketPriceInput::schema(),
                output: GetMarketPriceOutput::schema(),
            },
            FlowDescriptor {
                key: Self::CONSERVATION,
                description: "Sustainable water and soil conservation practices from environmental data",
                input: SustainablePracticeInput::schema(),
                output: SustainablePracticeOutput::schema(),
            },
            FlowDescriptor {
                key: Self::FINANCIAL,
                description: "Government financial support schemes a farmer is eligible for",
                input: GetFinancialSchemeAdvisoryInput::schema(),
                output: GetFinancialSchemeAdvisoryOutput::schema(),
            },
        ]
    }

    /// Invoke a flow by key with an untyped JSON request.
    pub async fn invoke_json(&self, key: &str, input: Value) -> Result<Value, FlowError> {
        match key {
            Self::DIAGNOSIS => {
                let input = decode_input(Self::DIAGNOSIS, input)?;
                encode_output(self.diagnosis.execute(&input).await?)
            }
            Self::MARKET_PRICE => {
                let input = decode_input(Self::MARKET_PRICE, input)?;
                encode_output(self.market_price.execute(&input).await?)
            }
            Self::CONSERVATION => {
                let input = decode_input(Self::CONSERVATION, input)?;
                encode_output(self.conservation.execute(&input).await?)
            }
            Self::FINANCIAL => {
                let input = decode_input(Self::FINANCIAL, input)?;
                encode_output(self.financial.execute(&input).await?)
            }
            other => Err(FlowError::UnknownFlow(other.to_string())),
        }
    }
}

fn decode_input<I: DeserializeOwned + Schema>(flow: &'static str, input: Value) -> Result<I, FlowError> {
    I::schema()
        .validate(&input)
        .map_err(|violations| FlowError::InvalidInput { flow, violations })?;
    serde_json::from_value(input).map_err(|e| FlowError::InvalidInput {
        flow,
        violations: vec![SchemaViolation {
            field: "$".to_string(),
            message: e.to_string(),
        }],
    })
}

fn encode_output<O: Serialize>(output: O) -> Result<Value, FlowError> {
    Ok(serde_json::to_value(output)?)
}
