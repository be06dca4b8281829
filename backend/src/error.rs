use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::{AnalysisError, PreprocessError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("File must be an image")]
    NotAnImage,
    #[error("No image file was uploaded")]
    MissingFile,
    #[error("File exceeds the upload limit of {0} bytes")]
    PayloadTooLarge(usize),
    #[error("Invalid upload: {0}")]
    Upload(String),
    #[error("Failed to preprocess image: {0}")]
    Decode(#[from] PreprocessError),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Preprocess(e) => ApiError::Decode(e),
            AnalysisError::Model(e) => ApiError::Internal(e.to_string()),
            AnalysisError::Encode(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ModelNotLoaded | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotAnImage
            | ApiError::MissingFile
            | ApiError::Upload(_)
            | ApiError::Decode(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
