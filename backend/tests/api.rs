use std::io::Cursor;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use image::{ImageFormat, RgbImage};
use neuroscan::assistant::AssistantResponder;
use neuroscan::assistant::prompt::{DISCLAIMER_MARKER, OFFLINE_FALLBACK};
use neuroscan::inference::model::ARCHITECTURE;
use neuroscan::inference::{ClassProbabilities, Classifier, ImageTensor, ModelError};
use neuroscan::routes::configure_routes;
use neuroscan::state::AppState;
use shared::{
    AnalysisResponse, ChatResponse, ClassesResponse, ErrorResponse, HealthResponse,
    ModelInfoResponse, Severity, TumorClass,
};

const BOUNDARY: &str = "neuroscan-test-boundary";

struct FixedClassifier([f32; 4]);

impl Classifier for FixedClassifier {
    fn predict(&self, _tensor: &ImageTensor) -> Result<ClassProbabilities, ModelError> {
        Ok(ClassProbabilities::new(self.0))
    }
}

fn offline_state() -> AppState {
    AppState::new(None, AssistantResponder::offline())
}

fn state_with(probabilities: [f32; 4]) -> AppState {
    let classifier = Arc::new(FixedClassifier(probabilities)) as Arc<dyn Classifier>;
    AppState::new(Some(classifier), AssistantResponder::offline())
}

fn form_part(name: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

fn form_request(parts: &[Vec<u8>]) -> test::TestRequest {
    let mut body = parts.concat();
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    test::TestRequest::post()
        .uri("/analyze")
        .insert_header(("content-type", format!("multipart/form-data; boundary={BOUNDARY}")))
        .set_payload(body)
}

fn analyze_request(filename: &str, content_type: &str, data: &[u8]) -> test::TestRequest {
    form_request(&[form_part("file", filename, content_type, data)])
}

fn black_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[actix_web::test]
async fn root_reports_running() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn health_without_model_or_key() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let health: HealthResponse =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.model_status, "not_loaded");
    assert_eq!(health.api_version, "2.0.0");
    assert!(!health.chatbot_enabled);
}

#[actix_web::test]
async fn health_reports_loaded_model() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.25; 4])))
            .configure(configure_routes),
    )
    .await;

    let health: HealthResponse =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
    assert_eq!(health.model_status, "loaded");
}

#[actix_web::test]
async fn classes_lists_all_four_in_order() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let classes: ClassesResponse =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/classes").to_request())
            .await;
    assert_eq!(classes.classes, vec!["glioma", "meningioma", "notumor", "pituitary"]);
    assert_eq!(classes.descriptions.len(), 4);
    assert!(classes.descriptions[&TumorClass::NoTumor].starts_with("No tumor"));
}

#[actix_web::test]
async fn model_info_reports_zero_params_without_model() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let info: ModelInfoResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/model-info").to_request(),
    )
    .await;
    assert_eq!(info.architecture, ARCHITECTURE);
    assert_eq!(info.input_size, "128x128 pixels");
    assert_eq!(info.classes.len(), 4);
    assert_eq!(info.total_params, 0);
    assert_eq!(info.trainable_params, 0);
}

#[actix_web::test]
async fn model_info_reports_network_params() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.25; 4])))
            .configure(configure_routes),
    )
    .await;

    let info: ModelInfoResponse = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/model-info").to_request(),
    )
    .await;
    assert_eq!(info.total_params, 15_763_908);
    assert_eq!(info.trainable_params, 8_128_644);
}

#[actix_web::test]
async fn chat_offline_returns_fallback() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(serde_json::json!({ "message": "What is a glioma?" }))
        .to_request();
    let chat: ChatResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(chat.response, OFFLINE_FALLBACK);
    assert!(chrono::DateTime::parse_from_rfc3339(&chat.timestamp).is_ok());
}

#[actix_web::test]
async fn chat_accepts_empty_message() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(serde_json::json!({ "message": "", "context": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let chat: ChatResponse = test::read_body_json(resp).await;
    assert!(chat.response.contains(DISCLAIMER_MARKER));
}

#[actix_web::test]
async fn chat_without_message_field_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(serde_json::json!({ "context": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
}

#[actix_web::test]
async fn analyze_without_model_is_server_error() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(offline_state()))
            .configure(configure_routes),
    )
    .await;

    let req = analyze_request("scan.png", "image/png", &black_png(16, 16)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "Model not loaded");
}

#[actix_web::test]
async fn analyze_rejects_non_image_upload() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.25; 4])))
            .configure(configure_routes),
    )
    .await;

    let req = analyze_request("notes.txt", "text/plain", b"hello").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "File must be an image");
}

#[actix_web::test]
async fn analyze_rejects_undecodable_image() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.25; 4])))
            .configure(configure_routes),
    )
    .await;

    let req = analyze_request("scan.png", "image/png", b"not really a png").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn analyze_enforces_upload_limit() {
    let state = state_with([0.25; 4]).with_upload_limit(64);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes),
    )
    .await;

    let req = analyze_request("scan.png", "image/png", &[0u8; 256]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[actix_web::test]
async fn analyze_black_scan() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.05, 0.1, 0.8, 0.05])))
            .configure(configure_routes),
    )
    .await;

    let req = analyze_request("scan.png", "image/png", &black_png(300, 200)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let analysis: AnalysisResponse = test::read_body_json(resp).await;
    assert!(analysis.success);
    assert_eq!(analysis.prediction.label, TumorClass::NoTumor);
    assert_eq!(analysis.prediction.classification, 2);
    assert_eq!(analysis.prediction.prediction_text, "No Tumor Detected");
    assert_eq!(analysis.prediction.box_class, Severity::TumorNegative);
    assert!((analysis.prediction.confidence - 80.0).abs() < 1e-3);

    let total: f32 = analysis.class_probabilities.values().sum();
    assert!((total - 100.0).abs() < 1e-2);
    assert_eq!(analysis.class_probabilities.len(), 4);
    assert!(!analysis.image_base64.is_empty());
    assert!(!analysis.medical_disclaimer.is_empty());
}

#[actix_web::test]
async fn analyze_tumor_verdict_names_class() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.7, 0.1, 0.1, 0.1])))
            .configure(configure_routes),
    )
    .await;

    let req = analyze_request("scan.jpg", "image/png", &black_png(128, 128)).to_request();
    let analysis: AnalysisResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(analysis.prediction.label, TumorClass::Glioma);
    assert_eq!(analysis.prediction.prediction_text, "Glioma Tumor Detected");
    assert_eq!(analysis.prediction.box_class, Severity::TumorPositive);
}

#[actix_web::test]
async fn analyze_skips_parts_before_the_file_field() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.05, 0.1, 0.8, 0.05])))
            .configure(configure_routes),
    )
    .await;

    let req = form_request(&[
        form_part("note", "note.txt", "text/plain", b"follow-up scan"),
        form_part("file", "scan.png", "image/png", &black_png(64, 64)),
    ])
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let analysis: AnalysisResponse = test::read_body_json(resp).await;
    assert_eq!(analysis.prediction.label, TumorClass::NoTumor);
}

#[actix_web::test]
async fn analyze_without_file_field_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_with([0.25; 4])))
            .configure(configure_routes),
    )
    .await;

    let req = form_request(&[form_part("image", "scan.png", "image/png", &black_png(16, 16))])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "No image file was uploaded");
}
