use std::path::Path;
use std::sync::Arc;

use tch::Device;

use crate::assistant::gemini::GeminiClient;
use crate::assistant::{AssistantResponder, LanguageModel};
use crate::config::{AppConfig, GeminiConfig};
use crate::inference::{Classifier, TumorClassifier};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Everything request handlers read. Built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    classifier: Option<Arc<dyn Classifier>>,
    assistant: AssistantResponder,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(classifier: Option<Arc<dyn Classifier>>, assistant: AssistantResponder) -> Self {
        Self {
            classifier,
            assistant,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Loads the classifier and connects the assistant. Either may come up
    /// absent; the service then runs degraded instead of exiting.
    pub fn initialize(config: &AppConfig) -> Self {
        let classifier = load_classifier(&config.weights_path);
        let assistant = AssistantResponder::new(connect_language_model(config.gemini.as_ref()));
        Self::new(classifier, assistant).with_upload_limit(config.max_upload_bytes)
    }

    pub fn classifier(&self) -> Option<&Arc<dyn Classifier>> {
        self.classifier.as_ref()
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn assistant(&self) -> &AssistantResponder {
        &self.assistant
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }
}

fn load_classifier(weights_path: &Path) -> Option<Arc<dyn Classifier>> {
    log::info!("Loading classifier from {}", weights_path.display());
    match TumorClassifier::load(weights_path, Device::cuda_if_available()) {
        Ok(classifier) => {
            log::info!("Model loaded successfully on {:?}", classifier.device());
            Some(Arc::new(classifier))
        }
        Err(e) => {
            log::error!("Failed to load model on startup: {}", e);
            log::warn!("Inference is disabled until the process is restarted");
            None
        }
    }
}

fn connect_language_model(config: Option<&GeminiConfig>) -> Option<Arc<dyn LanguageModel>> {
    let Some(config) = config else {
        log::warn!("GEMINI_API_KEY not found in environment variables");
        return None;
    };
    match GeminiClient::new(config) {
        Ok(client) => {
            log::info!("Gemini model {} initialized", client.model());
            Some(Arc::new(client))
        }
        Err(e) => {
            log::error!("Failed to initialize Gemini client: {}", e);
            None
        }
    }
}
