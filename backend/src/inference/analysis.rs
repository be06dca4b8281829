use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbImage};
use shared::AnalysisResponse;

use super::interpret::{PredictionResult, interpret};
use super::model::{Classifier, ModelError};
use super::preprocess::{PreprocessError, Preprocessed, preprocess};

pub const MEDICAL_DISCLAIMER: &str = "This is an AI-based screening tool and should not replace professional medical diagnosis. Please consult with a qualified healthcare provider for proper medical evaluation.";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("could not encode display image: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub prediction: PredictionResult,
    /// Base64 JPEG of the resized upload.
    pub image_base64: String,
}

impl Analysis {
    pub fn into_response(self) -> AnalysisResponse {
        AnalysisResponse {
            success: true,
            prediction: self.prediction.to_block(),
            class_probabilities: self.prediction.percentages,
            image_base64: self.image_base64,
            medical_disclaimer: MEDICAL_DISCLAIMER.to_string(),
        }
    }
}

/// Preprocess, classify and interpret one uploaded image.
pub fn analyze(classifier: &dyn Classifier, image_bytes: &[u8]) -> Result<Analysis, AnalysisError> {
    let Preprocessed { tensor, resized } = preprocess(image_bytes)?;
    let probabilities = classifier.predict(&tensor)?;
    let prediction = interpret(&probabilities);
    let image_base64 = encode_jpeg_base64(&resized)?;
    Ok(Analysis {
        prediction,
        image_base64,
    })
}

pub fn encode_jpeg_base64(image: &RgbImage) -> Result<String, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Jpeg)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}
