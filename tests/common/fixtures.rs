use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use image::{DynamicImage, ImageBuffer, Rgb};
use wastesort::core::db::{HistoryDb, NewWasteRecord};
use wastesort::{
    Classifier, ClassifierSettings, InferenceBackend, InferenceEngine, InferenceError, InputSpec,
    InputTensor, LabelSet, RawScores, TensorLayout,
};

/// Creates a solid-color 100x100 image.
pub fn solid_image(r: u8, g: u8, b: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(100, 100, |_, _| Rgb([r, g, b])))
}

pub fn small_spec() -> InputSpec {
    InputSpec {
        width: 4,
        height: 4,
        layout: TensorLayout::Nhwc,
    }
}

/// Backend returning the same scores on every call.
pub struct ScriptedBackend {
    pub scores: Vec<f32>,
    pub classes: Option<usize>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(scores: Vec<f32>) -> Self {
        let classes = Some(scores.len());
        Self {
            scores,
            classes,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InferenceBackend for ScriptedBackend {
    fn input_spec(&self) -> InputSpec {
        small_spec()
    }

    fn output_classes(&self) -> Option<usize> {
        self.classes
    }

    fn run(&self, tensor: &InputTensor) -> Result<RawScores, InferenceError> {
        assert_eq!((tensor.width, tensor.height), (4, 4));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawScores::new(self.scores.clone()))
    }
}

/// Backend whose first `failures` calls fail with a runtime error.
pub struct FailingBackend {
    pub failures: usize,
    pub scores: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new(failures: usize, scores: Vec<f32>) -> Self {
        Self {
            failures,
            scores,
            calls: AtomicUsize::new(0),
        }
    }
}

impl InferenceBackend for FailingBackend {
    fn input_spec(&self) -> InputSpec {
        small_spec()
    }

    fn output_classes(&self) -> Option<usize> {
        None
    }

    fn run(&self, _tensor: &InputTensor) -> Result<RawScores, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(InferenceError::Runtime("scripted failure".to_string()));
        }
        Ok(RawScores::new(self.scores.clone()))
    }
}

pub struct PanickingBackend;

impl InferenceBackend for PanickingBackend {
    fn input_spec(&self) -> InputSpec {
        small_spec()
    }

    fn output_classes(&self) -> Option<usize> {
        None
    }

    fn run(&self, _tensor: &InputTensor) -> Result<RawScores, InferenceError> {
        panic!("backend exploded");
    }
}

/// Backend that blocks inside `run` until the barrier is released twice:
/// once when the call starts and once to let it finish.
pub struct GatedBackend {
    pub gate: Arc<Barrier>,
}

impl InferenceBackend for GatedBackend {
    fn input_spec(&self) -> InputSpec {
        small_spec()
    }

    fn output_classes(&self) -> Option<usize> {
        Some(1)
    }

    fn run(&self, _tensor: &InputTensor) -> Result<RawScores, InferenceError> {
        self.gate.wait();
        self.gate.wait();
        Ok(RawScores::new(vec![4.0]))
    }
}

pub fn labels(names: &[&str]) -> LabelSet {
    LabelSet::new(names.iter().map(|s| s.to_string()).collect())
}

/// Creates a classifier around the given backend with default settings.
pub fn classifier_with(backend: impl InferenceBackend + 'static, labels: LabelSet) -> Classifier {
    Classifier::from_engine(
        InferenceEngine::with_backend(Box::new(backend), labels),
        &ClassifierSettings::default(),
    )
}

/// Creates a HistoryDb in a temporary directory.
/// Returns both the database and the temp directory (which must be kept alive).
pub async fn create_test_history() -> (HistoryDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let db = HistoryDb::open(dir.path().join("history.db"))
        .await
        .expect("Failed to open test history");
    (db, dir)
}

/// Creates a NewWasteRecord with test data
pub fn make_test_record(user_id: &str, waste_type: &str, confidence: f32) -> NewWasteRecord {
    NewWasteRecord {
        user_id: user_id.to_string(),
        waste_type: waste_type.to_string(),
        confidence,
        image_uri: Some(format!("file:///photos/{}.jpg", waste_type.to_lowercase())),
        disposal_advice: format!("Dispose of {} properly", waste_type),
        ..Default::default()
    }
}
