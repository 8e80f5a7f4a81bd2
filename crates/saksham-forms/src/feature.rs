//! The five feature forms and how each maps onto its advisory flow.

use crate::{FieldDef, Notification, ResultCard, SubmitError, ValidatedForm};
use crate::card::Emphasis;
use async_trait::async_trait;
use saksham_flows::{
    CropDiseaseDiagnosisFlow, DiagnoseCropDiseaseInput, DiagnoseCropDiseaseOutput,
    FinancialSchemeFlow, Flow, GetFinancialSchemeAdvisoryInput, GetFinancialSchemeAdvisoryOutput,
    GetMarketPriceInput, GetMarketPriceOutput, MarketPriceFlow, SustainablePracticeFlow,
    SustainablePracticeInput, SustainablePracticeOutput,
};
use serde::Serialize;
use std::fmt;

/// Image uploads above this many bytes are rejected.
pub const MAX_IMAGE_BYTES: u64 = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormId {
    CropDoctor,
    MarketPrices,
    ConservationPlanner,
    FinancialAdvisory,
    EntrepreneurshipSupport,
}

impl FormId {
    pub const ALL: [FormId; 5] = [
        FormId::CropDoctor,
        FormId::MarketPrices,
        FormId::ConservationPlanner,
        FormId::FinancialAdvisory,
        FormId::EntrepreneurshipSupport,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            FormId::CropDoctor => "crop-doctor",
            FormId::MarketPrices => "market-prices",
            FormId::ConservationPlanner => "conservation-planner",
            FormId::FinancialAdvisory => "financial-advisory",
            FormId::EntrepreneurshipSupport => "entrepreneurship-support",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.slug() == slug)
    }

    pub fn title(&self) -> &'static str {
        match self {
            FormId::CropDoctor => "AI Crop Doctor",
            FormId::MarketPrices => "Market Prices",
            FormId::ConservationPlanner => "Conservation Planner",
            FormId::FinancialAdvisory => "Financial Advisory",
            FormId::EntrepreneurshipSupport => "Entrepreneurship Support",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormId::CropDoctor => "Upload a photo of your crop to identify diseases or pests and get treatment advice.",
            FormId::MarketPrices => "Get the latest market price for your crop, answered in your own dialect.",
            FormId::ConservationPlanner => "Get water and soil conservation practices suited to your region, crops and data.",
            FormId::FinancialAdvisory => "Find government financial support schemes you may be eligible for.",
            FormId::EntrepreneurshipSupport => "Discover market linkages, microfinance options and schemes for your rural business idea.",
        }
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One feature form: its fields, how a validated form becomes a flow request,
/// and how the flow's answer is shown.
#[async_trait]
pub trait AdvisoryForm: Send + Sync + 'static {
    type Flow: Flow;

    fn id(&self) -> FormId;

    fn fields(&self) -> Vec<FieldDef>;

    fn submit_label(&self) -> &'static str;

    /// Shown while the request is in flight.
    fn pending_message(&self) -> &'static str;

    /// The single notification shown when a submission fails for any reason
    /// other than validation.
    fn failure(&self) -> Notification;

    /// Turn validated values into the flow request. Reading uploaded files
    /// happens here and may fail.
    async fn build_request(
        &self,
        form: ValidatedForm,
    ) -> Result<<Self::Flow as Flow>::Input, SubmitError>;

    fn card(&self, output: &<Self::Flow as Flow>::Output) -> ResultCard;
}

async fn encode_upload(form: &ValidatedForm, field: &'static str) -> Result<String, SubmitError> {
    let upload = form.file(field).ok_or(SubmitError::MissingFile(field))?;
    Ok(upload.read_as_data_uri().await?)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CropDoctor;

#[async_trait]
impl AdvisoryForm for CropDoctor {
    type Flow = CropDiseaseDiagnosisFlow;

    fn id(&self) -> FormId {
        FormId::CropDoctor
    }

    fn fields(&self) -> Vec<FieldDef> {
        vec![FieldDef::file("photo", "Crop Image")
            .accept("image/*")
            .single_file("Image is required.")
            .mime_prefix("image/", "Must be an image file.")
            .max_bytes(MAX_IMAGE_BYTES, "Max file size is 5MB.")]
    }

    fn submit_label(&self) -> &'static str {
        "Diagnose Crop"
    }

    fn pending_message(&self) -> &'static str {
        "Analyzing image..."
    }

    fn failure(&self) -> Notification {
        Notification::failure(
            "Diagnosis Failed",
            "An error occurred while analyzing the image. Please try again.",
        )
    }

    async fn build_request(&self, form: ValidatedForm) -> Result<DiagnoseCropDiseaseInput, SubmitError> {
        Ok(DiagnoseCropDiseaseInput {
            photo_data_uri: encode_upload(&form, "photo").await?,
        })
    }

    fn card(&self, output: &DiagnoseCropDiseaseOutput) -> ResultCard {
        ResultCard::new("Diagnosis Result")
            .section(
                "Identified Issue",
                output
                    .identified_issue()
                    .unwrap_or("No disease or pest identified."),
            )
            .section("Confidence", format!("{:.2}%", output.confidence * 100.0))
            .section("Recommendations", output.recommendations.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketPrices;

#[async_trait]
impl AdvisoryForm for MarketPrices {
    type Flow = MarketPriceFlow;

    fn id(&self) -> FormId {
        FormId::MarketPrices
    }

    fn fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::text("crop", "Crop Name", "e.g., Wheat, Rice")
                .min_length(2, "Crop name is required."),
            FieldDef::text("dialect", "Your Region / Dialect", "e.g., Punjab, Marathi")
                .min_length(2, "Dialect or region is required."),
        ]
    }

    fn submit_label(&self) -> &'static str {
        "Get Market Price"
    }

    fn pending_message(&self) -> &'static str {
        "Fetching latest prices..."
    }

    fn failure(&self) -> Notification {
        Notification::failure(
            "Request Failed",
            "An error occurred while fetching market prices. Please try again.",
        )
    }

    async fn build_request(&self, form: ValidatedForm) -> Result<GetMarketPriceInput, SubmitError> {
        Ok(GetMarketPriceInput {
            crop: form.text("crop"),
            dialect: form.text("dialect"),
        })
    }

    fn card(&self, output: &GetMarketPriceOutput) -> ResultCard {
        ResultCard::new("Market Price Information")
            .section_with("Latest Price", output.market_price.clone(), Emphasis::Highlight)
            .section_with("AI Voice Response", output.speech.clone(), Emphasis::Quote)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConservationPlanner;

#[async_trait]
impl AdvisoryForm for ConservationPlanner {
    type Flow = SustainablePracticeFlow;

    fn id(&self) -> FormId {
        FormId::ConservationPlanner
    }

    fn fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::text("region", "Region/Location", "e.g., Malwa, Punjab")
                .min_length(2, "Region is required."),
            FieldDef::text("crops", "Crops Cultivated", "e.g., Cotton, Sugarcane")
                .min_length(2, "Crops are required."),
            FieldDef::text("soilType", "Soil Type", "e.g., Alluvial, Black")
                .min_length(2, "Soil type is required."),
            FieldDef::long_text(
                "waterAvailability",
                "Water Availability",
                "Describe water availability (e.g., abundant, scarce, seasonal monsoon)",
            )
            .min_length(2, "Water availability is required."),
            FieldDef::text("climate", "Climate", "e.g., Tropical, Arid")
                .min_length(2, "Climate is required."),
            FieldDef::file("environmentalData", "Environmental Data File")
                .single_file("Data file is required."),
        ]
    }

    fn submit_label(&self) -> &'static str {
        "Get Suggestions"
    }

    fn pending_message(&self) -> &'static str {
        "Generating conservation plan..."
    }

    fn failure(&self) -> Notification {
        Notification::failure(
            "Planning Failed",
            "An error occurred while generating suggestions. Please try again.",
        )
    }

    async fn build_request(&self, form: ValidatedForm) -> Result<SustainablePracticeInput, SubmitError> {
        let environmental_data_uri = encode_upload(&form, "environmentalData").await?;
        Ok(SustainablePracticeInput {
            region: form.text("region"),
            crops: form.text("crops"),
            soil_type: form.text("soilType"),
            water_availability: form.text("waterAvailability"),
            climate: form.text("climate"),
            environmental_data_uri,
        })
    }

    fn card(&self, output: &SustainablePracticeOutput) -> ResultCard {
        ResultCard::new("Sustainable Practice Suggestions")
            .description("Based on your provided data, here are some AI-powered recommendations.")
            .section("Suggestions", output.suggestions.clone())
    }
}

fn scheme_request(form: &ValidatedForm) -> GetFinancialSchemeAdvisoryInput {
    GetFinancialSchemeAdvisoryInput {
        farmer_details: form.text("farmerDetails"),
        scheme_details: form.optional_text("schemeDetails"),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialAdvisory;

#[async_trait]
impl AdvisoryForm for FinancialAdvisory {
    type Flow = FinancialSchemeFlow;

    fn id(&self) -> FormId {
        FormId::FinancialAdvisory
    }

    fn fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::long_text(
                "farmerDetails",
                "Your Details",
                "Describe your farm size, crops grown, annual income, and any existing loans.",
            )
            .min_length(10, "Please provide some details about your farm and income."),
            FieldDef::optional_text(
                "schemeDetails",
                "Specific Schemes (Optional)",
                "e.g., PM-Kisan, Kisan Credit Card",
            ),
        ]
    }

    fn submit_label(&self) -> &'static str {
        "Get Scheme Advice"
    }

    fn pending_message(&self) -> &'static str {
        "Analyzing schemes for you..."
    }

    fn failure(&self) -> Notification {
        Notification::failure(
            "Request Failed",
            "An error occurred while fetching financial advice. Please try again.",
        )
    }

    async fn build_request(
        &self,
        form: ValidatedForm,
    ) -> Result<GetFinancialSchemeAdvisoryInput, SubmitError> {
        Ok(scheme_request(&form))
    }

    fn card(&self, output: &GetFinancialSchemeAdvisoryOutput) -> ResultCard {
        ResultCard::new("Financial Scheme Recommendations")
            .section("Eligible Schemes", output.eligible_schemes.clone())
            .section("Suggested Schemes", output.suggested_schemes.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntrepreneurshipSupport;

#[async_trait]
impl AdvisoryForm for EntrepreneurshipSupport {
    type Flow = FinancialSchemeFlow;

    fn id(&self) -> FormId {
        FormId::EntrepreneurshipSupport
    }

    fn fields(&self) -> Vec<FieldDef> {
        vec![
            FieldDef::long_text(
                "farmerDetails",
                "Your Business Idea & Resources",
                "Describe your business idea, available resources (land, skills), target market, and any financial needs.",
            )
            .min_length(10, "Please describe your business idea and resources."),
            FieldDef::optional_text(
                "schemeDetails",
                "Specific Support of Interest (Optional)",
                "e.g., Microfinance, MUDRA loan",
            ),
        ]
    }

    fn submit_label(&self) -> &'static str {
        "Find Opportunities"
    }

    fn pending_message(&self) -> &'static str {
        "Finding opportunities for you..."
    }

    fn failure(&self) -> Notification {
        Notification::failure(
            "Request Failed",
            "An error occurred while fetching opportunities. Please try again.",
        )
    }

    async fn build_request(
        &self,
        form: ValidatedForm,
    ) -> Result<GetFinancialSchemeAdvisoryInput, SubmitError> {
        Ok(scheme_request(&form))
    }

    fn card(&self, output: &GetFinancialSchemeAdvisoryOutput) -> ResultCard {
        ResultCard::new("Entrepreneurship Opportunities")
            .description("Our AI has analyzed potential support mechanisms. Explore these government schemes that may align with your entrepreneurial goals.")
            .section("Potentially Eligible Schemes", output.eligible_schemes.clone())
            .section("AI Suggested Schemes & Pathways", output.suggested_schemes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{validate, RawForm, Upload};

    #[test]
    fn test_slugs_round_trip() {
        for id in FormId::ALL {
            assert_eq!(FormId::from_slug(id.slug()), Some(id));
        }
        assert_eq!(FormId::from_slug("weather"), None);
    }

    #[test]
    fn test_crop_doctor_image_rules() {
        let fields = CropDoctor.fields();
        let photo = |upload: Upload| RawForm::new().file("photo", upload);

        let missing = validate(&fields, &RawForm::new()).unwrap_err();
        assert_eq!(missing.get("photo"), Some("Image is required."));

        let not_image = validate(
            &fields,
            &photo(Upload::from_bytes("notes.pdf", "application/pdf", vec![1])),
        )
        .unwrap_err();
        assert_eq!(not_image.get("photo"), Some("Must be an image file."));

        let too_big = validate(
            &fields,
            &photo(Upload::from_bytes(
                "leaf.jpg",
                "image/jpeg",
                vec![0; MAX_IMAGE_BYTES as usize + 1],
            )),
        )
        .unwrap_err();
        assert_eq!(too_big.get("photo"), Some("Max file size is 5MB."));

        let at_limit = photo(Upload::from_bytes(
            "leaf.jpg",
            "image/jpeg",
            vec![0; MAX_IMAGE_BYTES as usize],
        ));
        assert!(validate(&fields, &at_limit).is_ok());
    }

    #[test]
    fn test_conservation_requires_every_field() {
        let errors = validate(&ConservationPlanner.fields(), &RawForm::new()).unwrap_err();
        let messages: Vec<&str> = errors.iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec![
                "Region is required.",
                "Crops are required.",
                "Soil type is required.",
                "Water availability is required.",
                "Climate is required.",
                "Data file is required.",
            ]
        );
    }

    #[test]
    fn test_financial_and_entrepreneurship_messages_differ() {
        let raw = RawForm::new().text("farmerDetails", "2 acres");
        assert_eq!(
            validate(&FinancialAdvisory.fields(), &raw).unwrap_err().get("farmerDetails"),
            Some("Please provide some details about your farm and income.")
        );
        assert_eq!(
            validate(&EntrepreneurshipSupport.fields(), &raw)
                .unwrap_err()
                .get("farmerDetails"),
            Some("Please describe your business idea and resources.")
        );
    }

    #[tokio::test]
    async fn test_financial_blank_schemes_are_absent() {
        let raw = RawForm::new()
            .text("farmerDetails", "Five acres of paddy, income 2 lakh, one KCC loan")
            .text("schemeDetails", "");
        let validated = validate(&FinancialAdvisory.fields(), &raw).unwrap();
        let request = FinancialAdvisory.build_request(validated).await.unwrap();
        assert_eq!(request.scheme_details, None);
    }

    #[test]
    fn test_diagnosis_card() {
        let card = CropDoctor.card(&DiagnoseCropDiseaseOutput {
            disease: None,
            confidence: 0.8765,
            recommendations: "No action needed.".to_string(),
        });
        assert_eq!(card.get("Identified Issue"), Some("No disease or pest identified."));
        assert_eq!(card.get("Confidence"), Some("87.65%"));
    }
}
