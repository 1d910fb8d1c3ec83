use serde::{Deserialize, Serialize};

use crate::classify::error::InferenceError;
use crate::models::{LabelSet, Prediction, RawScores};

/// How raw model output is turned into probabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    /// Use the scores as-is when they already form a distribution, softmax otherwise.
    ///
    /// The choice is made from the values of each call, so logits that happen
    /// to lie in `[0, 1]` and sum to 1 are taken as probabilities. Pick
    /// `Logits` for a model known to emit raw logits.
    #[default]
    Auto,
    /// The model ends in a normalizing layer.
    Probabilities,
    /// The model emits unnormalized logits.
    Logits,
}

const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Numerically stable softmax: the max score is subtracted before exponentiating.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize_label(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Label for an output index, `"Unknown Class <index>"` past the end of the set.
pub fn label_for_index(labels: &LabelSet, index: usize) -> String {
    match labels.get(index) {
        Some(label) => capitalize_label(label),
        None => format!("Unknown Class {}", index),
    }
}

fn is_distribution(scores: &[f32]) -> bool {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    in_range && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreInterpreter {
    pub normalization: ScoreNormalization,
}

impl ScoreInterpreter {
    pub fn new(normalization: ScoreNormalization) -> Self {
        Self { normalization }
    }

    /// Convert raw scores into a probability distribution according to the policy.
    pub fn probabilities(&self, raw: &RawScores) -> Result<Vec<f32>, InferenceError> {
        let scores = raw.as_slice();
        if scores.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(InferenceError::NonFiniteScores);
        }

        let use_as_is = match self.normalization {
            ScoreNormalization::Probabilities => true,
            ScoreNormalization::Logits => false,
            ScoreNormalization::Auto => is_distribution(scores),
        };

        if use_as_is {
            Ok(scores.iter().map(|s| s.clamp(0.0, 1.0)).collect())
        } else {
            Ok(softmax(scores))
        }
    }

    /// Pick the top class and its confidence.
    pub fn interpret(&self, raw: &RawScores, labels: &LabelSet) -> Result<Prediction, InferenceError> {
        let probabilities = self.probabilities(raw)?;
        let index = argmax(&probabilities).ok_or(InferenceError::EmptyOutput)?;
        let confidence = probabilities[index];
        if !confidence.is_finite() {
            return Err(InferenceError::NonFiniteScores);
        }

        Ok(Prediction::new(label_for_index(labels, index), confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn labels(names: &[&str]) -> LabelSet {
        LabelSet::new(names.iter().map(|n| n.to_string()).collect())
    }

    #[test]
    fn softmax_of_logits() {
        let interpreter = ScoreInterpreter::default();
        let prediction = interpreter
            .interpret(
                &RawScores::new(vec![2.0, 1.0, 0.1]),
                &labels(&["Glass", "Plastic", "Metal"]),
            )
            .unwrap();

        assert_eq!(prediction.label, "Glass");
        assert_relative_eq!(prediction.confidence, 0.659, epsilon = 1e-3);
    }

    #[test]
    fn softmax_survives_huge_logits() {
        let probs = softmax(&[1000.0, 1.0, -5.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
        assert!(probs[0] > probs[3]);
    }

    #[test]
    fn probabilities_pass_through_in_auto_mode() {
        let interpreter = ScoreInterpreter::default();
        let probs = interpreter
            .probabilities(&RawScores::new(vec![0.1, 0.7, 0.2]))
            .unwrap();
        assert_eq!(probs, vec![0.1, 0.7, 0.2]);
    }

    #[test]
    fn logits_policy_always_applies_softmax() {
        let interpreter = ScoreInterpreter::new(ScoreNormalization::Logits);
        let probs = interpreter
            .probabilities(&RawScores::new(vec![0.1, 0.7, 0.2]))
            .unwrap();
        assert!(probs[1] < 0.7);
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);

        let prediction = ScoreInterpreter::default()
            .interpret(&RawScores::new(vec![3.0, 3.0]), &labels(&["first", "second"]))
            .unwrap();
        assert_eq!(prediction.label, "First");
        assert_relative_eq!(prediction.confidence, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn out_of_range_index_is_unknown_class() {
        let prediction = ScoreInterpreter::default()
            .interpret(&RawScores::new(vec![0.0, 0.0, 9.0]), &labels(&["glass", "metal"]))
            .unwrap();
        assert_eq!(prediction.label, "Unknown Class 2");
    }

    #[test]
    fn rejects_empty_and_non_finite_scores() {
        let interpreter = ScoreInterpreter::default();
        assert_eq!(
            interpreter.probabilities(&RawScores::new(vec![])),
            Err(InferenceError::EmptyOutput)
        );
        assert_eq!(
            interpreter.probabilities(&RawScores::new(vec![1.0, f32::NAN])),
            Err(InferenceError::NonFiniteScores)
        );
    }

    #[test]
    fn capitalizes_first_letter_only() {
        assert_eq!(capitalize_label("cardboard"), "Cardboard");
        assert_eq!(capitalize_label("non-biodegradable"), "Non-biodegradable");
        assert_eq!(capitalize_label("Glass"), "Glass");
        assert_eq!(capitalize_label(""), "");
    }

    #[test]
    fn auto_passes_through_distribution_shaped_logits() {
        let raw = RawScores::new(vec![0.6, 0.3, 0.1]);
        let names = labels(&["glass", "plastic", "metal"]);

        let auto = ScoreInterpreter::new(ScoreNormalization::Auto).interpret(&raw, &names).unwrap();
        assert_relative_eq!(auto.confidence, 0.6, epsilon = 1e-6);

        let logits = ScoreInterpreter::new(ScoreNormalization::Logits).interpret(&raw, &names).unwrap();
        assert_eq!(logits.label, "Glass");
        assert_relative_eq!(logits.confidence, 0.426, epsilon = 1e-3);
    }
}
