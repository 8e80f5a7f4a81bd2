//! Crop disease and pest diagnosis from a photo.

use crate::{FlowError, PromptInput, Schema, StructuredPrompt};
use saksham_llm::LLMProvider;
use saksham_prompt::{FieldSpec, ObjectSchema, PromptValue, PromptValues};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROMPT: &str = r#"You are an AI assistant that specializes in diagnosing crop diseases and pest infestations from images.

Analyze the image of the crop provided and identify any potential diseases or pests.
Provide a confidence score indicating the certainty of the diagnosis and recommendations for treatment and prevention.
If no disease or pest is found, indicate that the crop appears healthy.

Photo: {{media url=photoDataUri}}
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseCropDiseaseInput {
    /// `data:<mimetype>;base64,<encoded_data>`
    pub photo_data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnoseCropDiseaseOutput {
    /// `None` or empty when the crop looks healthy.
    #[serde(default)]
    pub disease: Option<String>,
    pub confidence: f64,
    pub recommendations: String,
}

impl DiagnoseCropDiseaseOutput {
    pub fn identified_issue(&self) -> Option<&str> {
        self.disease
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

impl Schema for DiagnoseCropDiseaseInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![FieldSpec::data_uri(
            "photoDataUri",
            "A photo of the crop, as a data URI that must include a MIME type and use Base64 encoding. Expected format: data:<mimetype>;base64,<encoded_data>.",
        )])
    }
}

impl PromptInput for DiagnoseCropDiseaseInput {
    fn prompt_values(&self) -> PromptValues {
        let mut values = PromptValues::new();
        values.insert("photoDataUri", PromptValue::DataUri(self.photo_data_uri.clone()));
        values
    }
}

impl Schema for DiagnoseCropDiseaseOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::string(
                "disease",
                "The name of the identified disease or pest, or null if none are found.",
            )
            .nullable(),
            FieldSpec::number(
                "confidence",
                "A confidence score between 0 and 1 indicating the certainty of the diagnosis.",
            )
            .range(0.0, 1.0),
            FieldSpec::string(
                "recommendations",
                "Recommendations for treatment and prevention of the identified disease or pest.",
            ),
        ])
    }
}

pub type CropDiseaseDiagnosisFlow = StructuredPrompt<DiagnoseCropDiseaseInput, DiagnoseCropDiseaseOutput>;

pub fn crop_disease_diagnosis_flow(
    llm: Arc<dyn LLMProvider>,
) -> Result<CropDiseaseDiagnosisFlow, FlowError> {
    StructuredPrompt::new("diagnoseCropDisease", PROMPT, llm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_embeds_photo() {
        let flow = crop_disease_diagnosis_flow(Arc::new(saksham_llm::FakeProvider::new())).unwrap();
        assert_eq!(flow.template().placeholders(), vec!["photoDataUri"]);
    }

    #[test]
    fn test_identified_issue_treats_blank_as_healthy() {
        let mut output = DiagnoseCropDiseaseOutput {
            disease: Some("  ".to_string()),
            confidence: 0.9,
            recommendations: "Keep monitoring.".to_string(),
        };
        assert_eq!(output.identified_issue(), None);
        output.disease = Some("Early blight".to_string());
        assert_eq!(output.identified_issue(), Some("Early blight"));
    }
}
