//! Advisory flows: one typed request in, one schema-checked response out.

mod conservation;
mod diagnosis;
mod executor;
mod financial;
mod market_price;
mod registry;

pub use conservation::{
    sustainable_practice_flow, SustainablePracticeFlow, SustainablePracticeInput,
    SustainablePracticeOutput,
};
pub use diagnosis::{
    crop_disease_diagnosis_flow, CropDiseaseDiagnosisFlow, DiagnoseCropDiseaseInput,
    DiagnoseCropDiseaseOutput,
};
pub use executor::{Flow, FlowError, PromptInput, Schema, StructuredPrompt};
pub use financial::{
    financial_scheme_flow, FinancialSchemeFlow, GetFinancialSchemeAdvisoryInput,
    GetFinancialSchemeAdvisoryOutput,
};
pub use market_price::{market_price_flow, GetMarketPriceInput, GetMarketPriceOutput, MarketPriceFlow};
pub use registry::{AdvisoryFlows, FlowDescriptor};
