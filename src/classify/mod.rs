pub mod engine;
pub mod error;
pub mod fallback;
pub mod preprocessing;
pub mod scores;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use image::DynamicImage;

use crate::assets::ModelAssets;
use crate::config::ClassifierSettings;
use crate::models::{LabelSet, Prediction};
use engine::InferenceEngine;
use error::ClassifyError;
use fallback::FallbackClassifier;
use scores::ScoreInterpreter;

/// Run `primary`; on error, invalid output or panic, return `fallback(err)` instead.
pub fn run_with_fallback<P, F>(primary: P, fallback: F) -> Prediction
where
    P: FnOnce() -> Result<Prediction, ClassifyError>,
    F: FnOnce(&ClassifyError) -> Prediction,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(primary)).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ClassifyError::Panicked(msg))
    });

    match outcome {
        Ok(prediction) if prediction.is_valid() => prediction,
        Ok(prediction) => fallback(&ClassifyError::Inference(
            error::InferenceError::Runtime(format!("invalid prediction {:?}", prediction)),
        )),
        Err(e) => fallback(&e),
    }
}

/// Waste image classifier.
///
/// Runs preprocessing, inference and score interpretation when a model is
/// loaded, and the color heuristic otherwise. `classify` never fails: any
/// error along the model path degrades that single call to the heuristic.
pub struct Classifier {
    engine: InferenceEngine,
    interpreter: ScoreInterpreter,
    fallback: FallbackClassifier,
    last_fallback: Mutex<Option<String>>,
}

impl Classifier {
    /// Load the model and labels from the given assets. Missing or broken
    /// assets leave the classifier on the heuristic path.
    pub fn new(assets: ModelAssets, settings: &ClassifierSettings) -> Self {
        let engine = InferenceEngine::load(
            assets.model,
            assets.labels.as_deref(),
            (settings.input_width, settings.input_height),
        );
        Self::from_engine(engine, settings)
    }

    pub fn from_engine(engine: InferenceEngine, settings: &ClassifierSettings) -> Self {
        Self {
            engine,
            interpreter: ScoreInterpreter::new(settings.normalization),
            fallback: FallbackClassifier::new(settings.sample_stride),
            last_fallback: Mutex::new(None),
        }
    }

    /// Classify an image. Always returns a prediction.
    pub fn classify(&self, img: &DynamicImage) -> Prediction {
        let prediction = run_with_fallback(
            || self.classify_with_model(img),
            |err| {
                tracing::debug!(error = %err, "using heuristic classification");
                self.record_fallback(Some(err.to_string()));
                self.fallback.classify(img)
            },
        );
        tracing::debug!(label = %prediction.label, confidence = prediction.confidence, "classified");
        prediction
    }

    fn classify_with_model(&self, img: &DynamicImage) -> Result<Prediction, ClassifyError> {
        // cleared here so a fallback recorded by this call is the one reported
        self.record_fallback(None);
        let spec = self.engine.input_spec().ok_or_else(|| {
            if self.engine.is_closed() {
                error::InferenceError::Closed
            } else {
                error::InferenceError::ModelAbsent
            }
        })?;
        let tensor = preprocessing::prepare(img, spec.width, spec.height)?;
        let raw = self.engine.run(&tensor)?;
        Ok(self.interpreter.interpret(&raw, self.engine.labels())?)
    }

    fn record_fallback(&self, reason: Option<String>) {
        *self.last_fallback.lock().unwrap_or_else(PoisonError::into_inner) = reason;
    }

    /// Reason the most recent call used the heuristic, if it did.
    pub fn last_fallback_reason(&self) -> Option<String> {
        self.last_fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    pub fn labels(&self) -> &LabelSet {
        self.engine.labels()
    }

    /// Human-readable description of the classification path in use.
    pub fn model_info(&self) -> String {
        let mut info = match (self.engine.input_spec(), self.engine.is_closed()) {
            (Some(spec), _) => format!(
                "Model loaded ({}x{}, {} labels)",
                spec.width,
                spec.height,
                self.engine.labels().len()
            ),
            (None, true) => "Classifier closed, using heuristic classification".to_string(),
            (None, false) => match self.engine.load_error() {
                Some(e) => format!("Using heuristic classification (model failed to load: {})", e),
                None => "Using heuristic classification (model not loaded)".to_string(),
            },
        };
        if self.engine.is_loaded() {
            if let Some(reason) = self.last_fallback_reason() {
                info.push_str(&format!("; last classification used heuristic fallback: {}", reason));
            }
        }
        info
    }

    /// Release the model. Idempotent; later `classify` calls use the heuristic.
    pub fn close(&self) {
        self.engine.close();
    }
}
