use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// The four classes the classifier was trained on. Declaration order is the
/// index order of the network's output layer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumCount,
    Display,
    AsRefStr,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TumorClass {
    Glioma,
    Meningioma,
    NoTumor,
    Pituitary,
}

impl TumorClass {
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    pub fn description(self) -> &'static str {
        match self {
            TumorClass::Glioma => "A type of tumor that occurs in the brain and spinal cord",
            TumorClass::Meningioma => {
                "A tumor that forms on membranes that cover the brain and spinal cord"
            }
            TumorClass::NoTumor => "No tumor detected in the brain scan",
            TumorClass::Pituitary => "A tumor that forms in the pituitary gland",
        }
    }

    pub fn is_tumor(self) -> bool {
        self != TumorClass::NoTumor
    }

    pub fn verdict(self) -> String {
        if !self.is_tumor() {
            return "No Tumor Detected".to_string();
        }
        let label = self.label();
        let mut chars = label.chars();
        match chars.next() {
            Some(first) => format!("{}{} Tumor Detected", first.to_uppercase(), chars.as_str()),
            None => "Tumor Detected".to_string(),
        }
    }

    pub fn labels() -> Vec<String> {
        Self::iter().map(|class| class.label().to_string()).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    TumorPositive,
    TumorNegative,
}

impl From<TumorClass> for Severity {
    fn from(class: TumorClass) -> Self {
        if class.is_tumor() {
            Severity::TumorPositive
        } else {
            Severity::TumorNegative
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionBlock {
    pub classification: usize,
    pub label: TumorClass,
    pub confidence: f32,
    pub prediction_text: String,
    pub box_class: Severity,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisResponse {
    pub success: bool,
    pub prediction: PredictionBlock,
    pub class_probabilities: BTreeMap<TumorClass, f32>,
    pub image_base64: String,
    pub medical_disclaimer: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelInfoResponse {
    pub architecture: String,
    pub input_size: String,
    pub classes: Vec<String>,
    pub total_params: u64,
    pub trainable_params: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassesResponse {
    pub classes: Vec<String>,
    pub descriptions: BTreeMap<TumorClass, String>,
}

impl ClassesResponse {
    pub fn catalogue() -> Self {
        Self {
            classes: TumorClass::labels(),
            descriptions: TumorClass::iter()
                .map(|class| (class, class.description().to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub model_status: String,
    pub api_version: String,
    pub chatbot_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
}
