use std::sync::Arc;

use saksham_common::DataUri;
use saksham_flows::{
    AdvisoryFlows, DiagnoseCropDiseaseInput, Flow, FlowError, GetFinancialSchemeAdvisoryInput,
    GetMarketPriceInput, SustainablePracticeInput,
};
use saksham_llm::{FakeProvider, Part};

fn flows_with(fake: &Arc<FakeProvider>) -> AdvisoryFlows {
    AdvisoryFlows::new(fake.clone()).expect("flows should build")
}

fn photo() -> String {
    DataUri::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]).encode()
}

#[tokio::test]
async fn market_price_for_wheat_in_punjabi() {
    let fake = Arc::new(FakeProvider::with_advisory_responses());
    let flows = flows_with(&fake);

    let output = flows
        .market_price
        .run(GetMarketPriceInput {
            crop: "Wheat".to_string(),
            dialect: "Punjabi".to_string(),
        })
        .await
        .expect("market price flow should succeed");

    assert!(!output.market_price.is_empty());
    assert!(!output.speech.is_empty());
    assert_eq!(fake.call_count(), 1);

    let prompt = fake.last_request().unwrap().prompt_text();
    assert!(prompt.contains("Crop: Wheat"));
    assert!(prompt.contains("Dialect: Punjabi"));
}

#[tokio::test]
async fn diagnosis_sends_photo_as_inline_media() {
    let fake = Arc::new(FakeProvider::with_advisory_responses());
    let flows = flows_with(&fake);

    let output = flows
        .diagnosis
        .run(DiagnoseCropDiseaseInput {
            photo_data_uri: photo(),
        })
        .await
        .unwrap();
    assert!((0.0..=1.0).contains(&output.confidence));
    assert!(output.identified_issue().is_some());

    let request = fake.last_request().unwrap();
    let media: Vec<&Part> = request.messages[0]
        .parts
        .iter()
        .filter(|p| matches!(p, Part::Media { .. }))
        .collect();
    assert_eq!(
        media,
        vec![&Part::Media {
            mime_type: "image/jpeg".to_string(),
            data: "/9j/4A==".to_string(),
        }]
    );
    assert!(request.output_schema.is_some());
}

#[tokio::test]
async fn diagnosis_rejects_out_of_range_confidence() {
    let fake = Arc::new(FakeProvider::with_response(
        "diagnosing crop diseases",
        r#"{"disease": "Leaf blight", "confidence": 87, "recommendations": "Spray copper oxychloride."}"#,
    ));
    let flows = flows_with(&fake);

    let err = flows
        .diagnosis
        .run(DiagnoseCropDiseaseInput {
            photo_data_uri: photo(),
        })
        .await
        .unwrap_err();

    match err {
        FlowError::NonConforming { details, .. } => {
            assert!(details[0].contains("confidence"), "details: {details:?}");
        }
        other => panic!("expected schema violation, got {other}"),
    }
}

#[tokio::test]
async fn diagnosis_accepts_null_disease_for_healthy_crop() {
    let fake = Arc::new(FakeProvider::with_response(
        "diagnosing crop diseases",
        r#"{"disease": null, "confidence": 0.95, "recommendations": "The crop appears healthy."}"#,
    ));
    let output = flows_with(&fake)
        .diagnosis
        .run(DiagnoseCropDiseaseInput {
            photo_data_uri: photo(),
        })
        .await
        .unwrap();
    assert_eq!(output.disease, None);
    assert_eq!(output.identified_issue(), None);
}

#[tokio::test]
async fn diagnosis_rejects_non_data_uri_before_calling() {
    let fake = Arc::new(FakeProvider::with_advisory_responses());
    let err = flows_with(&fake)
        .diagnosis
        .run(DiagnoseCropDiseaseInput {
            photo_data_uri: "https://example.com/leaf.jpg".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidInput { .. }));
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn conservation_embeds_environmental_data() {
    let fake = Arc::new(FakeProvider::with_advisory_responses());
    let output = flows_with(&fake)
        .conservation
        .run(SustainablePracticeInput {
            region: "Malwa, Punjab".to_string(),
            crops: "Cotton".to_string(),
            soil_type: "Alluvial".to_string(),
            water_availability: "Scarce outside the monsoon".to_string(),
            climate: "Semi-arid".to_string(),
            environmental_data_uri: DataUri::new("text/csv", b"month,rain_mm\nJul,180\n".to_vec())
                .encode(),
        })
        .await
        .unwrap();
    assert!(!output.suggestions.is_empty());

    let request = fake.last_request().unwrap();
    let prompt = request.prompt_text();
    assert!(prompt.contains("Soil Type: Alluvial"));
    assert!(request.messages[0]
        .parts
        .iter()
        .any(|p| matches!(p, Part::Media { mime_type, .. } if mime_type == "text/csv")));
}

#[tokio::test]
async fn financial_advisory_without_optional_schemes() {
    let fake = Arc::new(FakeProvider::with_advisory_responses());
    let output = flows_with(&fake)
        .financial
        .run(GetFinancialSchemeAdvisoryInput {
            farmer_details: "2 acres, wheat and mustard, no loans".to_string(),
            scheme_details: None,
        })
        .await
        .unwrap();
    assert!(!output.eligible_schemes.is_empty());
    assert!(!output.suggested_schemes.is_empty());

    let prompt = fake.last_request().unwrap().prompt_text();
    assert!(prompt.contains("Scheme Details: \n"));
}

#[tokio::test]
async fn provider_failure_is_not_retried() {
    let fake = Arc::new(FakeProvider::failing("503 Service Unavailable"));
    let err = flows_with(&fake)
        .market_price
        .run(GetMarketPriceInput {
            crop: "Rice".to_string(),
            dialect: "Marathi".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Provider { .. }));
    assert_eq!(fake.call_count(), 1);
}
