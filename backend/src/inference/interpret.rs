use std::collections::BTreeMap;

use shared::{PredictionBlock, Severity, TumorClass};
use strum::{EnumCount, IntoEnumIterator};

/// Largest accepted distance between the score total and 1.
pub const SUM_TOLERANCE: f32 = 1e-3;

/// Softmax output of the classifier, one probability per [`TumorClass`] in
/// label order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities([f32; TumorClass::COUNT]);

impl ClassProbabilities {
    pub fn new(values: [f32; TumorClass::COUNT]) -> Self {
        Self(values)
    }

    /// Returns `None` unless `values` holds exactly one score per class.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        <[f32; TumorClass::COUNT]>::try_from(values).ok().map(Self)
    }

    pub fn get(&self, class: TumorClass) -> f32 {
        self.0[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TumorClass, f32)> + '_ {
        TumorClass::iter().zip(self.0.iter().copied())
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Checks that every score is a probability and that the scores form a
    /// distribution. NaN and infinite scores are rejected.
    pub fn validate(&self) -> Result<(), String> {
        if let Some((class, score)) = self.iter().find(|(_, p)| !(0.0..=1.0).contains(p)) {
            return Err(format!("score for {} is {}", class, score));
        }
        let total = self.sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("class scores sum to {}", total));
        }
        Ok(())
    }

    /// Most probable class; ties go to the lowest index.
    pub fn argmax(&self) -> TumorClass {
        let mut best = TumorClass::Glioma;
        for (class, probability) in self.iter() {
            if probability > self.get(best) {
                best = class;
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub class: TumorClass,
    /// Probability of the selected class, in percent.
    pub confidence: f32,
    pub verdict: String,
    pub severity: Severity,
    pub percentages: BTreeMap<TumorClass, f32>,
}

impl PredictionResult {
    pub fn to_block(&self) -> PredictionBlock {
        PredictionBlock {
            classification: self.class.index(),
            label: self.class,
            confidence: self.confidence,
            prediction_text: self.verdict.clone(),
            box_class: self.severity,
        }
    }

    /// Sentence the chat client passes back as assistant context.
    pub fn context_summary(&self) -> String {
        format!(
            "Current analysis shows: {} with {:.1}% confidence.",
            self.verdict, self.confidence
        )
    }
}

pub fn interpret(probabilities: &ClassProbabilities) -> PredictionResult {
    let class = probabilities.argmax();
    PredictionResult {
        class,
        confidence: probabilities.get(class) * 100.0,
        verdict: class.verdict(),
        severity: Severity::from(class),
        percentages: probabilities
            .iter()
            .map(|(class, probability)| (class, probability * 100.0))
            .collect(),
    }
}
