pub mod analysis;
pub mod interpret;
pub mod model;
pub mod preprocess;
pub mod weights;

pub use analysis::{Analysis, AnalysisError, MEDICAL_DISCLAIMER, analyze};
pub use interpret::{ClassProbabilities, PredictionResult, interpret};
pub use model::{Classifier, ModelError, ParameterCounts, TumorClassifier};
pub use preprocess::{IMAGE_SIZE, ImageTensor, PreprocessError, Preprocessed, preprocess};
