//! Government financial support schemes a farmer or rural entrepreneur may qualify for.

use crate::{FlowError, PromptInput, Schema, StructuredPrompt};
use saksham_llm::LLMProvider;
use saksham_prompt::{FieldSpec, ObjectSchema, PromptValue, PromptValues};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROMPT: &str = r#"You are an AI assistant that provides information about government financial support schemes for farmers.

Based on the farmer's details, suggest a list of schemes that the farmer is eligible for and a list of schemes that the agent suggests.

Farmer Details: {{{farmerDetails}}}
Scheme Details: {{{schemeDetails}}}
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFinancialSchemeAdvisoryInput {
    pub farmer_details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFinancialSchemeAdvisoryOutput {
    pub eligible_schemes: String,
    pub suggested_schemes: String,
}

impl Schema for GetFinancialSchemeAdvisoryInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::string(
                "farmerDetails",
                "Details about the farmer, including farm size, crops grown, income, and any existing loans.",
            ),
            FieldSpec::string(
                "schemeDetails",
                "Details about specific financial schemes the farmer is interested in. Optional.",
            )
            .optional(),
        ])
    }
}

impl PromptInput for GetFinancialSchemeAdvisoryInput {
    fn prompt_values(&self) -> PromptValues {
        let mut values = PromptValues::new();
        values.insert("farmerDetails", PromptValue::Text(self.farmer_details.clone()));
        if let Some(schemes) = &self.scheme_details {
            values.insert("schemeDetails", PromptValue::Text(schemes.clone()));
        }
        values
    }
}

impl Schema for GetFinancialSchemeAdvisoryOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::string(
                "eligibleSchemes",
                "A list of government financial support schemes the farmer is eligible for, based on their details.",
            ),
            FieldSpec::string(
                "suggestedSchemes",
                "A list of government financial support schemes the agent suggests.",
            ),
        ])
    }
}

pub type FinancialSchemeFlow = StructuredPrompt<GetFinancialSchemeAdvisoryInput, GetFinancialSchemeAdvisoryOutput>;

pub fn financial_scheme_flow(llm: Arc<dyn LLMProvider>) -> Result<FinancialSchemeFlow, FlowError> {
    StructuredPrompt::new("getFinancialSchemeAdvisory", PROMPT, llm)
}
