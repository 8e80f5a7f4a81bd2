//! Latest market price for a crop, phrased in the farmer's dialect.

use crate::{FlowError, PromptInput, Schema, StructuredPrompt};
use saksham_llm::LLMProvider;
use saksham_prompt::{FieldSpec, ObjectSchema, PromptValue, PromptValues};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROMPT: &str = r#"You are a helpful AI assistant for farmers. A farmer will ask for market prices for their crops, and you will provide the latest market price in their local dialect.

Crop: {{{crop}}}
Dialect: {{{dialect}}}

Market Price:"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetMarketPriceInput {
    pub crop: String,
    pub dialect: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMarketPriceOutput {
    pub market_price: String,
    /// Spoken-style answer in the requested dialect. Audio synthesis is not done here.
    pub speech: String,
}

impl Schema for GetMarketPriceInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::string("crop", "The crop for which to get the market price."),
            FieldSpec::string("dialect", "The local dialect of the farmer."),
        ])
    }
}

impl PromptInput for GetMarketPriceInput {
    fn prompt_values(&self) -> PromptValues {
        let mut values = PromptValues::new();
        values.insert("crop", PromptValue::Text(self.crop.clone()));
        values.insert("dialect", PromptValue::Text(self.dialect.clone()));
        values
    }
}

impl Schema for GetMarketPriceOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::string("marketPrice", "The latest market price for the crop."),
            FieldSpec::string("speech", "The speech response in the local dialect."),
        ])
    }
}

pub type MarketPriceFlow = StructuredPrompt<GetMarketPriceInput, GetMarketPriceOutput>;

pub fn market_price_flow(llm: Arc<dyn LLMProvider>) -> Result<MarketPriceFlow, FlowError> {
    StructuredPrompt::new("getMarketPrice", PROMPT, llm)
}
