use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use shared::{
    ChatRequest, ClassesResponse, HealthResponse, ModelInfoResponse, StatusResponse, TumorClass,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::inference::model::ARCHITECTURE;
use crate::inference::{IMAGE_SIZE, analyze};
use crate::state::AppState;

pub const API_VERSION: &str = "2.0.0";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/analyze").route(web::post().to(analyze_image)))
        .service(web::resource("/chat").route(web::post().to(chat)))
        .service(web::resource("/model-info").route(web::get().to(model_info)))
        .service(web::resource("/classes").route(web::get().to(classes)));
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        message: "Brain Tumor Detection API is running".to_string(),
        status: "healthy".to_string(),
    })
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let model_status = if state.model_loaded() { "loaded" } else { "not_loaded" };
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_status: model_status.to_string(),
        api_version: API_VERSION.to_string(),
        chatbot_enabled: state.assistant().is_available(),
    })
}

pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|essence| essence.starts_with("image/"))
}

/// Form field the upload is expected under.
pub const UPLOAD_FIELD: &str = "file";

/// Finds the `file` part of the form, skipping any other parts, and rejects
/// it before buffering when it is not an image.
async fn read_image_field(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut field = loop {
        let mut field = payload.try_next().await?.ok_or(ApiError::MissingFile)?;
        if field.name() == Some(UPLOAD_FIELD) {
            break field;
        }
        while field.try_next().await?.is_some() {}
    };

    let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
    if !is_image_content_type(content_type.as_deref()) {
        warn!("Rejected upload with content type {:?}", content_type);
        return Err(ApiError::NotAnImage);
    }

    let mut image_data = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk?;
        if image_data.len() + data.len() > limit {
            return Err(ApiError::PayloadTooLarge(limit));
        }
        image_data.extend_from_slice(&data);
    }

    if image_data.is_empty() {
        return Err(ApiError::MissingFile);
    }
    Ok(image_data)
}

async fn analyze_image(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let classifier = state.classifier().cloned().ok_or(ApiError::ModelNotLoaded)?;
    let image_data = read_image_field(&mut payload, state.max_upload_bytes()).await?;

    let request_id = Uuid::new_v4();
    info!("[{}] Analyzing {} byte upload", request_id, image_data.len());

    let analysis = web::block(move || analyze(classifier.as_ref(), &image_data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            error!("[{}] Error during image analysis: {}", request_id, e);
            ApiError::from(e)
        })?;

    info!("[{}] {}", request_id, analysis.prediction.context_summary());
    Ok(HttpResponse::Ok().json(analysis.into_response()))
}

async fn chat(state: web::Data<AppState>, request: web::Json<ChatRequest>) -> HttpResponse {
    let ChatRequest { message, context } = request.into_inner();
    let exchange = state.assistant().exchange(message, context).await;
    HttpResponse::Ok().json(exchange.into_response())
}

async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    let counts = state
        .classifier()
        .map(|classifier| classifier.parameter_counts())
        .unwrap_or_default();
    HttpResponse::Ok().json(ModelInfoResponse {
        architecture: ARCHITECTURE.to_string(),
        input_size: format!("{}x{} pixels", IMAGE_SIZE, IMAGE_SIZE),
        classes: TumorClass::labels(),
        total_params: counts.total,
        trainable_params: counts.trainable,
    })
}

async fn classes() -> HttpResponse {
    HttpResponse::Ok().json(ClassesResponse::catalogue())
}
