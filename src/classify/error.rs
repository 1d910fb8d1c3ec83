use thiserror::Error;

/// The input image cannot be turned into a tensor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("degenerate source image {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },
    #[error("degenerate target size {width}x{height}")]
    DegenerateTarget { width: u32, height: u32 },
}

/// The model resource could not be turned into a usable engine.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model resource is empty")]
    EmptyModel,
    #[error("failed to parse model: {0}")]
    Parse(String),
    #[error("model declares no inputs")]
    NoInputs,
    #[error("model declares no outputs")]
    NoOutputs,
    #[error("unsupported input shape {0:?}, expected rank 4 with 3 channels")]
    UnsupportedInputShape(Vec<Option<usize>>),
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
}

/// A forward pass could not produce scores.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("no model loaded")]
    ModelAbsent,
    #[error("inference engine already closed")]
    Closed,
    #[error("input tensor is {actual:?}, model expects {expected:?}")]
    InputShapeMismatch { expected: (u32, u32), actual: (u32, u32) },
    #[error("model produced {actual} scores, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model produced no scores")]
    EmptyOutput,
    #[error("model produced non-finite scores")]
    NonFiniteScores,
    #[error("inference runtime failed: {0}")]
    Runtime(String),
}

/// Any failure along the preprocess, inference and interpretation path.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("classification panicked: {0}")]
    Panicked(String),
}
