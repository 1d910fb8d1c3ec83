use std::sync::{Mutex, MutexGuard, PoisonError};

use rten::{Dimension, Model};
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};

use crate::classify::error::{InferenceError, LoadError};
use crate::models::{InputTensor, LabelSet, RawScores};

/// Input size used when the model does not declare fixed spatial dimensions.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

/// Memory layout of the model's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[N, H, W, C]`
    Nhwc,
    /// `[N, C, H, W]`
    Nchw,
}

/// Spatial size and layout the model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
}

impl InputSpec {
    /// Work out the input spec from a declared rank-4 shape. Unknown spatial
    /// dimensions take `default_size`.
    pub fn from_shape(dims: &[Option<usize>], default_size: (u32, u32)) -> Result<Self, LoadError> {
        let [_, d1, d2, d3] = dims else {
            return Err(LoadError::UnsupportedInputShape(dims.to_vec()));
        };

        let (layout, h, w) = match (d1, d3) {
            (_, Some(3)) => (TensorLayout::Nhwc, d1, d2),
            (Some(3), _) => (TensorLayout::Nchw, d2, d3),
            // channel count unknown: assume NHWC like the TFLite-style models we ship
            (_, None) => (TensorLayout::Nhwc, d1, d2),
            _ => return Err(LoadError::UnsupportedInputShape(dims.to_vec())),
        };

        Ok(Self {
            width: w.map(|w| w as u32).unwrap_or(default_size.0),
            height: h.map(|h| h as u32).unwrap_or(default_size.1),
            layout,
        })
    }
}

/// A runtime capable of one forward pass over a prepared tensor.
pub trait InferenceBackend: Send {
    fn input_spec(&self) -> InputSpec;

    /// Number of classes declared by the model, if fixed.
    fn output_classes(&self) -> Option<usize>;

    fn run(&self, tensor: &InputTensor) -> Result<RawScores, InferenceError>;
}

/// `rten` model loaded from a serialized `.rten` graph.
pub struct RtenBackend {
    model: Model,
    spec: InputSpec,
    classes: Option<usize>,
}

fn fixed_dims(dims: Option<Vec<Dimension>>) -> Option<Vec<Option<usize>>> {
    dims.map(|dims| {
        dims.into_iter()
            .map(|d| match d {
                Dimension::Fixed(n) => Some(n),
                Dimension::Symbolic(_) => None,
            })
            .collect()
    })
}

impl RtenBackend {
    pub fn load(model_bytes: Vec<u8>, default_size: (u32, u32)) -> Result<Self, LoadError> {
        if model_bytes.is_empty() {
            return Err(LoadError::EmptyModel);
        }
        let model = Model::load(model_bytes).map_err(|e| LoadError::Parse(e.to_string()))?;

        let input_id = *model.input_ids().first().ok_or(LoadError::NoInputs)?;
        let output_id = *model.output_ids().first().ok_or(LoadError::NoOutputs)?;

        let input_dims = model
            .node_info(input_id)
            .and_then(|info| fixed_dims(info.shape()));
        let spec = match input_dims {
            Some(dims) => InputSpec::from_shape(&dims, default_size)?,
            None => InputSpec {
                width: default_size.0,
                height: default_size.1,
                layout: TensorLayout::Nhwc,
            },
        };

        let classes = model
            .node_info(output_id)
            .and_then(|info| fixed_dims(info.shape()))
            .and_then(|dims| dims.last().copied().flatten());

        Ok(Self {
            model,
            spec,
            classes,
        })
    }
}

/// Lay out a prepared HWC tensor the way the model expects it.
fn to_model_input(layout: TensorLayout, tensor: &InputTensor) -> NdTensor<f32, 4> {
    let (h, w) = (tensor.height as usize, tensor.width as usize);
    let hwc = NdTensor::from_data([1, h, w, InputTensor::CHANNELS], tensor.data.clone());
    match layout {
        TensorLayout::Nhwc => hwc,
        TensorLayout::Nchw => hwc.permuted([0, 3, 1, 2]).to_tensor(),
    }
}

/// Reject empty output and output that disagrees with the declared class count.
fn check_scores(classes: Option<usize>, scores: Vec<f32>) -> Result<RawScores, InferenceError> {
    if scores.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }
    if let Some(classes) = classes {
        if scores.len() != classes {
            return Err(InferenceError::ShapeMismatch {
                expected: classes,
                actual: scores.len(),
            });
        }
    }
    Ok(RawScores::new(scores))
}

impl InferenceBackend for RtenBackend {
    fn input_spec(&self) -> InputSpec {
        self.spec
    }

    fn output_classes(&self) -> Option<usize> {
        self.classes
    }

    fn run(&self, tensor: &InputTensor) -> Result<RawScores, InferenceError> {
        let expected = (self.spec.width, self.spec.height);
        let actual = (tensor.width, tensor.height);
        let expected_len = tensor.width as usize * tensor.height as usize * InputTensor::CHANNELS;
        if expected != actual || tensor.data.len() != expected_len {
            return Err(InferenceError::InputShapeMismatch { expected, actual });
        }

        let input = to_model_input(self.spec.layout, tensor);
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        let output = Tensor::<f32>::try_from(output)
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        check_scores(self.classes, output.iter().copied().collect())
    }
}

/// Whether a model is available. There is no retry once a load has failed.
pub enum EngineState {
    Loaded(Box<dyn InferenceBackend>),
    Absent,
    Closed,
}

/// Owns the model handle and the labels it was trained with.
///
/// `run` calls are serialized through an internal lock, so a shared engine can
/// be called from several threads.
pub struct InferenceEngine {
    state: Mutex<EngineState>,
    labels: LabelSet,
    load_error: Option<String>,
}

impl InferenceEngine {
    /// Load from raw asset bytes. Never fails: a missing or unparsable model
    /// leaves the engine `Absent`, missing labels fall back to the defaults.
    pub fn load(model_bytes: Option<Vec<u8>>, labels: Option<&[u8]>, default_size: (u32, u32)) -> Self {
        let labels = LabelSet::from_resource(labels);

        let Some(bytes) = model_bytes else {
            tracing::info!("no model resource, using heuristic classification");
            return Self::absent(labels, None);
        };

        match RtenBackend::load(bytes, default_size) {
            Ok(backend) => {
                let spec = backend.input_spec();
                tracing::info!(
                    width = spec.width,
                    height = spec.height,
                    layout = ?spec.layout,
                    classes = ?backend.output_classes(),
                    labels = labels.len(),
                    "model loaded"
                );
                Self::with_backend(Box::new(backend), labels)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load model, using heuristic classification");
                Self::absent(labels, Some(e.to_string()))
            }
        }
    }

    pub fn with_backend(backend: Box<dyn InferenceBackend>, labels: LabelSet) -> Self {
        Self {
            state: Mutex::new(EngineState::Loaded(backend)),
            labels,
            load_error: None,
        }
    }

    pub fn absent(labels: LabelSet, load_error: Option<String>) -> Self {
        Self {
            state: Mutex::new(EngineState::Absent),
            labels,
            load_error,
        }
    }

    // A panic inside a backend must not take the engine down with it.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.lock(), EngineState::Loaded(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), EngineState::Closed)
    }

    pub fn input_spec(&self) -> Option<InputSpec> {
        match &*self.lock() {
            EngineState::Loaded(backend) => Some(backend.input_spec()),
            _ => None,
        }
    }

    /// One forward pass. Holds the engine lock for the duration of the call.
    pub fn run(&self, tensor: &InputTensor) -> Result<RawScores, InferenceError> {
        match &*self.lock() {
            EngineState::Loaded(backend) => backend.run(tensor),
            EngineState::Absent => Err(InferenceError::ModelAbsent),
            EngineState::Closed => Err(InferenceError::Closed),
        }
    }

    /// Release the model. Safe to call repeatedly.
    pub fn close(&self) {
        let mut state = self.lock();
        if matches!(*state, EngineState::Loaded(_)) {
            tracing::debug!("releasing model");
        }
        *state = EngineState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct FixedBackend(Vec<f32>);

    impl InferenceBackend for FixedBackend {
        fn input_spec(&self) -> InputSpec {
            InputSpec { width: 2, height: 2, layout: TensorLayout::Nhwc }
        }

        fn output_classes(&self) -> Option<usize> {
            Some(self.0.len())
        }

        fn run(&self, _tensor: &InputTensor) -> Result<RawScores, InferenceError> {
            Ok(RawScores::new(self.0.clone()))
        }
    }

    fn tensor() -> InputTensor {
        InputTensor { width: 2, height: 2, data: vec![0.5; 12] }
    }

    #[test]
    fn nhwc_shape() {
        let spec = InputSpec::from_shape(&[Some(1), Some(300), Some(200), Some(3)], (224, 224)).unwrap();
        assert_eq!(spec, InputSpec { width: 200, height: 300, layout: TensorLayout::Nhwc });
    }

    #[test]
    fn nchw_shape() {
        let spec = InputSpec::from_shape(&[Some(1), Some(3), Some(128), Some(96)], (224, 224)).unwrap();
        assert_eq!(spec, InputSpec { width: 96, height: 128, layout: TensorLayout::Nchw });
    }

    #[test]
    fn symbolic_dims_use_defaults() {
        let spec = InputSpec::from_shape(&[None, None, None, Some(3)], (224, 224)).unwrap();
        assert_eq!((spec.width, spec.height), (224, 224));
    }

    #[test]
    fn unsupported_shapes() {
        assert!(InputSpec::from_shape(&[Some(1), Some(224), Some(224)], (224, 224)).is_err());
        assert!(InputSpec::from_shape(&[Some(1), Some(1), Some(224), Some(224)], (224, 224)).is_err());
    }

    #[test]
    fn garbage_model_is_absent() {
        let engine = InferenceEngine::load(Some(b"not a model".to_vec()), None, DEFAULT_INPUT_SIZE);
        assert!(!engine.is_loaded());
        assert!(engine.load_error().is_some());
        assert_eq!(engine.run(&tensor()), Err(InferenceError::ModelAbsent));
        assert_eq!(engine.labels(), &LabelSet::default());
    }

    #[test]
    fn empty_model_is_absent() {
        let engine = InferenceEngine::load(Some(Vec::new()), None, DEFAULT_INPUT_SIZE);
        assert!(!engine.is_loaded());
    }

    #[test]
    fn run_after_close_fails_fast() {
        let engine = InferenceEngine::with_backend(Box::new(FixedBackend(vec![1.0, 2.0])), LabelSet::default());
        assert_eq!(engine.run(&tensor()).unwrap().as_slice(), &[1.0, 2.0]);

        engine.close();
        engine.close();
        assert!(!engine.is_loaded());
        assert!(engine.is_closed());
        assert_eq!(engine.run(&tensor()), Err(InferenceError::Closed));
    }

    // value encodes position: y * 100 + x * 10 + channel
    fn positional_tensor() -> InputTensor {
        let mut data = Vec::new();
        for y in 0..2 {
            for x in 0..2 {
                for c in 0..3 {
                    data.push((y * 100 + x * 10 + c) as f32);
                }
            }
        }
        InputTensor { width: 2, height: 2, data }
    }

    #[test]
    fn nhwc_input_keeps_pixel_order() {
        let input = to_model_input(TensorLayout::Nhwc, &positional_tensor());
        assert_eq!(input.shape(), [1, 2, 2, 3]);
        for y in 0..2 {
            for x in 0..2 {
                for c in 0..3 {
                    assert_eq!(input[[0, y, x, c]], (y * 100 + x * 10 + c) as f32);
                }
            }
        }
    }

    #[test]
    fn nchw_input_is_channels_first() {
        let input = to_model_input(TensorLayout::Nchw, &positional_tensor());
        assert_eq!(input.shape(), [1, 3, 2, 2]);
        for y in 0..2 {
            for x in 0..2 {
                for c in 0..3 {
                    assert_eq!(input[[0, c, y, x]], (y * 100 + x * 10 + c) as f32);
                }
            }
        }
    }

    #[test]
    fn score_count_must_match_declared_classes() {
        assert_eq!(
            check_scores(Some(3), vec![0.1, 0.2, 0.3, 0.4]),
            Err(InferenceError::ShapeMismatch { expected: 3, actual: 4 })
        );
        assert_eq!(check_scores(Some(3), Vec::new()), Err(InferenceError::EmptyOutput));
        assert_eq!(check_scores(None, Vec::new()), Err(InferenceError::EmptyOutput));

        let scores = check_scores(Some(2), vec![0.25, 0.75]).unwrap();
        assert_eq!(scores.as_slice(), &[0.25, 0.75]);
        assert_eq!(check_scores(None, vec![1.0; 7]).unwrap().len(), 7);
    }

    /// Records how many `run` calls overlap.
    struct OverlapBackend {
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl InferenceBackend for OverlapBackend {
        fn input_spec(&self) -> InputSpec {
            InputSpec { width: 2, height: 2, layout: TensorLayout::Nhwc }
        }

        fn output_classes(&self) -> Option<usize> {
            Some(1)
        }

        fn run(&self, _tensor: &InputTensor) -> Result<RawScores, InferenceError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawScores::new(vec![1.0]))
        }
    }

    #[test]
    fn concurrent_runs_are_serialized() {
        let max_active = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = InferenceEngine::with_backend(
            Box::new(OverlapBackend {
                active: Arc::new(AtomicUsize::new(0)),
                max_active: max_active.clone(),
                calls: calls.clone(),
            }),
            LabelSet::default(),
        );

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..3 {
                        assert!(engine.run(&tensor()).is_ok());
                    }
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }
}
