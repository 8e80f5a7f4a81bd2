//! Water and soil conservation practices for a region, its crops and an environmental data file.

use crate::{FlowError, PromptInput, Schema, StructuredPrompt};
use saksham_llm::LLMProvider;
use saksham_prompt::{FieldSpec, ObjectSchema, PromptValue, PromptValues};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROMPT: &str = r#"You are an expert in sustainable agriculture practices.

Based on the environmental data, region, crops, soil type, water availability and climate, suggest sustainable practices for water and soil conservation tailored to the region and crops.

Region: {{{region}}}
Crops: {{{crops}}}
Soil Type: {{{soilType}}}
Water Availability: {{{waterAvailability}}}
Climate: {{{climate}}}
Environmental Data: {{media url=environmentalDataUri}}

Suggestions:"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainablePracticeInput {
    pub region: String,
    pub crops: String,
    pub soil_type: String,
    pub water_availability: String,
    pub climate: String,
    pub environmental_data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SustainablePracticeOutput {
    pub suggestions: String,
}

impl Schema for SustainablePracticeInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::string("region", "The region or location of the farm."),
            FieldSpec::string("crops", "The crops being cultivated on the farm."),
            FieldSpec::string("soilType", "The type of soil on the farm."),
            FieldSpec::string(
                "waterAvailability",
                "A description of the water availability in the region (e.g., abundant, scarce, seasonal).",
            ),
            FieldSpec::string("climate", "The climate of the region."),
            FieldSpec::data_uri(
                "environmentalDataUri",
                "A data URI containing environmental data for the region, that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
            ),
        ])
    }
}

impl PromptInput for SustainablePracticeInput {
    fn prompt_values(&self) -> PromptValues {
        let mut values = PromptValues::new();
        values.insert("region", PromptValue::Text(self.region.clone()));
        values.insert("crops", PromptValue::Text(self.crops.clone()));
        values.insert("soilType", PromptValue::Text(self.soil_type.clone()));
        values.insert(
            "waterAvailability",
            PromptValue::Text(self.water_availability.clone()),
        );
        values.insert("climate", PromptValue::Text(self.climate.clone()));
        values.insert(
            "environmentalDataUri",
            PromptValue::DataUri(self.environmental_data_uri.clone()),
        );
        values
    }
}

impl Schema for SustainablePracticeOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![FieldSpec::string(
            "suggestions",
            "A list of sustainable practices tailored to the region and crops for water and soil conservation.",
        )])
    }
}

pub type SustainablePracticeFlow = StructuredPrompt<SustainablePracticeInput, SustainablePracticeOutput>;

pub fn sustainable_practice_flow(
    llm: Arc<dyn LLMProvider>,
) -> Result<SustainablePracticeFlow, FlowError> {
    StructuredPrompt::new("suggestSustainablePractices", PROMPT, llm)
}
